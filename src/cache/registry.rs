//! Provider Registry
//!
//! Maps each [`ProviderKind`] to a factory, builds facades from configuration,
//! and owns the process-wide default facade.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::config::{CacheConfig, ProviderKind};
use crate::error::{CacheError, Result};
use crate::providers::{FileProviderFactory, MemoryProviderFactory, Provider, RemoteProviderFactory};

// == Provider Factory ==
/// Builds a ready provider (background work started) from configuration.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Provider>>;
}

// == Registry ==
pub struct Registry {
    factories: HashMap<ProviderKind, Arc<dyn ProviderFactory>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the memory, file and remote factories.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderKind::Memory, Arc::new(MemoryProviderFactory));
        registry.register(ProviderKind::File, Arc::new(FileProviderFactory));
        registry.register(ProviderKind::Remote, Arc::new(RemoteProviderFactory));
        registry
    }

    // == Register ==
    /// Installs `factory` for `kind`, returning the one it replaced.
    pub fn register(
        &mut self,
        kind: ProviderKind,
        factory: Arc<dyn ProviderFactory>,
    ) -> Option<Arc<dyn ProviderFactory>> {
        let previous = self.factories.insert(kind, factory);
        if previous.is_some() {
            warn!(provider = %kind, "Replacing registered provider factory");
        }
        previous
    }

    pub fn is_registered(&self, kind: ProviderKind) -> bool {
        self.factories.contains_key(&kind)
    }

    // == Build ==
    /// Validates `config` and builds the selected provider.
    pub async fn build_provider(&self, config: &CacheConfig) -> Result<Arc<dyn Provider>> {
        config.validate()?;

        let factory = self.factories.get(&config.provider).ok_or_else(|| {
            CacheError::Config(format!("no factory registered for provider {}", config.provider))
        })?;
        factory.create(config).await
    }

    /// Builds the selected provider and wraps it in a facade.
    pub async fn new_cache(&self, config: &CacheConfig) -> Result<Cache> {
        let provider = self.build_provider(config).await?;
        let cache = Cache::from_config(provider, config)?;
        info!(
            provider = %config.provider,
            namespace = %config.namespace,
            "Cache created"
        );
        Ok(cache)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// == Global Instance ==
static GLOBAL: Lazy<RwLock<Option<Cache>>> = Lazy::new(|| RwLock::new(None));

/// Returns the process-wide facade, building it from
/// `CacheConfig::default()` on first use.
pub async fn global() -> Result<Cache> {
    if let Some(cache) = GLOBAL.read().await.as_ref() {
        return Ok(cache.clone());
    }

    let mut slot = GLOBAL.write().await;
    if let Some(cache) = slot.as_ref() {
        return Ok(cache.clone());
    }

    let cache = Registry::with_defaults()
        .new_cache(&CacheConfig::default())
        .await?;
    *slot = Some(cache.clone());
    Ok(cache)
}

/// Replaces the process-wide facade with one built from `config`.
///
/// The new facade is built first; on failure the current one stays in place.
/// Returns the previous facade so the caller can close it. Holders of the
/// previous facade keep using it until they fetch [`global`] again.
pub async fn configure(config: CacheConfig) -> Result<Option<Cache>> {
    configure_with(&Registry::with_defaults(), config).await
}

/// [`configure`] with a caller-supplied registry.
pub async fn configure_with(registry: &Registry, config: CacheConfig) -> Result<Option<Cache>> {
    let cache = registry.new_cache(&config).await?;
    Ok(GLOBAL.write().await.replace(cache))
}

/// Removes and closes the process-wide facade, if any.
pub async fn shutdown() -> Result<()> {
    let previous = GLOBAL.write().await.take();
    match previous {
        Some(cache) => cache.close().await,
        None => Ok(()),
    }
}

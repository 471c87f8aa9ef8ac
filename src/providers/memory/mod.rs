//! In-Process Provider
//!
//! A [`MemoryStore`] behind a tokio `RwLock`, with an optional sweep task for
//! active expiry. Process-local only.

mod store;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::registry::ProviderFactory;
use crate::cache::EvictionPolicy;
use crate::config::{CacheConfig, MemoryConfig};
use crate::error::{CacheError, Result};
use crate::providers::{AtomicSupport, Provider, ProviderCounters, TagSupport};
use crate::tasks::spawn_sweep_task;

pub use store::MemoryStore;

// == Memory Provider ==
pub struct MemoryProvider {
    store: Arc<RwLock<MemoryStore>>,
    cleanup_interval: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl MemoryProvider {
    // == Constructor ==
    /// Creates an empty provider. No background work is started.
    ///
    /// # Arguments
    /// * `max_size` - Item bound, 0 for unbounded
    /// * `policy` - Victim selection rule used when the bound is reached
    /// * `cleanup_interval` - Period of the sweep started by [`start_sweeper`](Self::start_sweeper)
    pub fn new(max_size: usize, policy: EvictionPolicy, cleanup_interval: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new(max_size, policy))),
            cleanup_interval,
            sweeper: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.max_size, config.eviction_policy, config.cleanup_interval)
    }

    // == Start Sweeper ==
    /// Starts the active expiry task. Calling it twice keeps the first task.
    pub fn start_sweeper(&self) {
        let mut slot = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() || self.closed.load(Ordering::Acquire) {
            return;
        }

        let store = self.store.clone();
        *slot = Some(spawn_sweep_task("memory", self.cleanup_interval, move || {
            let store = store.clone();
            async move { Ok(store.write().await.purge_expired(Instant::now())) }
        }));
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::Operation("memory provider is closed".to_string()));
        }
        Ok(())
    }

    fn stop_sweeper(&self) {
        let handle = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for MemoryProvider {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        Ok(self.store.write().await.get(key, Instant::now()))
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut store = self.store.write().await;

        Ok(keys
            .iter()
            .filter_map(|key| store.get(key, now).map(|value| (key.clone(), value)))
            .collect())
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        self.store.write().await.set(key, value, ttl, Instant::now());
        Ok(())
    }

    async fn set_multi(&self, items: Vec<(String, Value)>, ttl: Option<Duration>) -> Result<()> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut store = self.store.write().await;
        for (key, value) in items {
            store.set(&key, value, ttl, now);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.store.write().await.delete(key, Instant::now()))
    }

    async fn delete_multi(&self, keys: &[String]) -> Result<usize> {
        self.ensure_open()?;
        let now = Instant::now();
        let mut store = self.store.write().await;
        Ok(keys.iter().filter(|key| store.delete(key, now)).count())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.store.write().await.exists(key, Instant::now()))
    }

    async fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        self.store.write().await.clear();
        debug!("Memory provider flushed");
        Ok(())
    }

    async fn get_ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.ensure_open()?;
        self.store
            .write()
            .await
            .ttl(key, Instant::now())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.stop_sweeper();
        self.store.write().await.clear();
        info!("Memory provider closed");
        Ok(())
    }

    async fn counters(&self) -> ProviderCounters {
        self.store.read().await.counters()
    }

    async fn reset_counters(&self) {
        self.store.write().await.reset_counters();
    }

    async fn health_check(&self) -> Result<()> {
        self.ensure_open()
    }

    fn tagging(&self) -> Option<&dyn TagSupport> {
        Some(self)
    }

    fn atomic(&self) -> Option<&dyn AtomicSupport> {
        Some(self)
    }
}

#[async_trait]
impl TagSupport for MemoryProvider {
    async fn set_with_tags(
        &self,
        key: &str,
        value: Value,
        tags: &[String],
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.store
            .write()
            .await
            .set_with_tags(key, value, tags, ttl, Instant::now());
        Ok(())
    }

    async fn keys_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.store.write().await.keys_by_tag(tag, Instant::now()))
    }

    async fn delete_by_tag(&self, tag: &str) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.store.write().await.delete_by_tag(tag, Instant::now()))
    }
}

#[async_trait]
impl AtomicSupport for MemoryProvider {
    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<bool> {
        self.ensure_open()?;
        Ok(self
            .store
            .write()
            .await
            .set_if_absent(key, value, ttl, Instant::now()))
    }

    async fn delete_if_equals(&self, key: &str, expected: &Value) -> Result<bool> {
        self.ensure_open()?;
        Ok(self
            .store
            .write()
            .await
            .delete_if_equals(key, expected, Instant::now()))
    }

    async fn expire_if_equals(&self, key: &str, expected: &Value, ttl: Duration) -> Result<bool> {
        self.ensure_open()?;
        Ok(self
            .store
            .write()
            .await
            .expire_if_equals(key, expected, ttl, Instant::now()))
    }
}

// == Factory ==
/// Builds a [`MemoryProvider`] and starts its sweep task.
#[derive(Debug, Default)]
pub struct MemoryProviderFactory;

#[async_trait]
impl ProviderFactory for MemoryProviderFactory {
    async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Provider>> {
        let provider = MemoryProvider::from_config(&config.memory);
        provider.start_sweeper();
        info!(
            max_size = config.memory.max_size,
            policy = %config.memory.eviction_policy,
            "Memory provider ready"
        );
        Ok(Arc::new(provider))
    }
}

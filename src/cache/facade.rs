//! Cache Facade
//!
//! The handle callers use. Wraps one provider and adds key namespacing,
//! default TTL injection, key validation, typed values, statistics and event
//! notification.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::events::{CacheEvent, CacheListener, EventKind, ListenerId, Listeners};
use crate::cache::lock::DistributedLock;
use crate::cache::stats::{CacheStats, StatsCollector};
use crate::cache::MAX_KEY_LENGTH;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::providers::{Provider, TagSupport};

/// Separator between namespace and key.
const NAMESPACE_SEPARATOR: char = ':';

/// Provider keys starting with this belong to the cache itself. User keys
/// and namespaces may not start with it.
pub const RESERVED_KEY_PREFIX: &str = "__";

/// Prefix of every lock record, ahead of the namespace.
pub const LOCK_KEY_PREFIX: &str = "__lock:";

// == Cache ==
/// Namespaced, statistics-aware view over one provider.
///
/// Clones and [`with_namespace`](Cache::with_namespace) views share the
/// provider, the statistics collector and the listeners.
#[derive(Clone)]
pub struct Cache {
    provider: Arc<dyn Provider>,
    namespace: Arc<str>,
    default_ttl: Option<Duration>,
    stats: Arc<StatsCollector>,
    listeners: Arc<Listeners>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("provider", &self.provider.name())
            .field("namespace", &self.namespace)
            .field("default_ttl", &self.default_ttl)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Cache {
    // == Constructors ==
    /// Wraps `provider`.
    ///
    /// # Arguments
    /// * `provider` - The backend every call is delegated to
    /// * `namespace` - Key prefix, empty for none; must not contain `:` or start with `__`
    /// * `default_ttl` - Lifetime used when a call passes none; None or zero = never expire
    pub fn new(
        provider: Arc<dyn Provider>,
        namespace: impl Into<String>,
        default_ttl: Option<Duration>,
    ) -> Result<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;

        Ok(Self {
            provider,
            namespace: namespace.into(),
            default_ttl: default_ttl.filter(|ttl| !ttl.is_zero()),
            stats: Arc::new(StatsCollector::new()),
            listeners: Arc::new(Listeners::new()),
        })
    }

    /// Wraps `provider` with the namespace and default TTL from `config`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &CacheConfig) -> Result<Self> {
        Self::new(provider, config.namespace.clone(), config.default_ttl)
    }

    // == With Namespace ==
    /// Returns a view over the same provider, statistics and listeners with
    /// another prefix.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;

        Ok(Self {
            provider: self.provider.clone(),
            namespace: namespace.into(),
            default_ttl: self.default_ttl,
            stats: self.stats.clone(),
            listeners: self.listeners.clone(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Name of the backing provider.
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    // == Key Mapping ==
    fn full_key(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Ok(self.prefixed(key))
    }

    fn prefixed(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", self.namespace, NAMESPACE_SEPARATOR, name)
        }
    }

    /// Reverses [`prefixed`](Self::prefixed). None for keys outside this namespace.
    fn strip<'a>(&self, full: &'a str) -> Option<&'a str> {
        if self.namespace.is_empty() {
            return Some(full);
        }
        full.strip_prefix(&*self.namespace)?.strip_prefix(NAMESPACE_SEPARATOR)
    }

    fn full_keys<S: AsRef<str>>(&self, keys: &[S]) -> Result<Vec<String>> {
        keys.iter().map(|key| self.full_key(key.as_ref())).collect()
    }

    fn full_tag(&self, tag: &str) -> Result<String> {
        if tag.is_empty() {
            return Err(CacheError::KeyInvalid("tag must not be empty".to_string()));
        }
        Ok(self.prefixed(tag))
    }

    fn resolve_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        match ttl {
            Some(ttl) if !ttl.is_zero() => Some(ttl),
            _ => self.default_ttl,
        }
    }

    fn notify(&self, kind: EventKind, key: Option<&str>) {
        self.listeners.emit(&CacheEvent {
            kind,
            namespace: &self.namespace,
            key,
        });
    }

    fn tagging(&self) -> Result<&dyn TagSupport> {
        self.provider.tagging().ok_or_else(|| {
            CacheError::Unsupported(format!("{} provider has no tag support", self.provider.name()))
        })
    }

    // == Get ==
    /// Reads and decodes a value. Absent or expired keys are `Ok(None)`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_value(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Reads the raw stored value.
    pub async fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let full = self.full_key(key)?;
        let value = self.provider.get(&full).await?;

        if value.is_some() {
            self.stats.record_hit();
            self.notify(EventKind::Get, Some(key));
        } else {
            self.stats.record_miss();
        }
        Ok(value)
    }

    // == Get Multi ==
    /// Reads several keys at once. Only found keys appear in the result.
    pub async fn get_multi<T, S>(&self, keys: &[S]) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned,
        S: AsRef<str>,
    {
        let full = self.full_keys(keys)?;
        let found = self.provider.get_multi(&full).await?;

        self.stats.record_hits(found.len() as u64);
        let missed = full.len().saturating_sub(found.len());
        self.stats.record_misses(missed as u64);

        let mut result = HashMap::with_capacity(found.len());
        for (full_key, value) in found {
            if let Some(key) = self.strip(&full_key) {
                self.notify(EventKind::Get, Some(key));
                result.insert(key.to_string(), serde_json::from_value(value)?);
            }
        }
        Ok(result)
    }

    // == Set ==
    /// Encodes and stores a value.
    ///
    /// # Arguments
    /// * `key` - Key within this namespace
    /// * `value` - Any serializable value
    /// * `ttl` - Lifetime; None or zero falls back to the default TTL
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let full = self.full_key(key)?;
        let value = serde_json::to_value(value)?;

        self.provider.set(&full, value, self.resolve_ttl(ttl)).await?;
        self.stats.record_sets(1);
        self.notify(EventKind::Set, Some(key));
        Ok(())
    }

    // == Set Multi ==
    /// Stores every pair with the same lifetime.
    pub async fn set_multi<K, T>(&self, items: &[(K, T)], ttl: Option<Duration>) -> Result<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        let mut encoded = Vec::with_capacity(items.len());
        for (key, value) in items {
            encoded.push((self.full_key(key.as_ref())?, serde_json::to_value(value)?));
        }

        self.provider.set_multi(encoded, self.resolve_ttl(ttl)).await?;
        self.stats.record_sets(items.len() as u64);
        for (key, _) in items {
            self.notify(EventKind::Set, Some(key.as_ref()));
        }
        Ok(())
    }

    // == Delete ==
    /// Removes a key. Returns false if it was not there.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let full = self.full_key(key)?;
        let removed = self.provider.delete(&full).await?;
        if removed {
            self.stats.record_deletes(1);
            self.notify(EventKind::Delete, Some(key));
        }
        Ok(removed)
    }

    /// Removes several keys. Returns how many were there.
    ///
    /// Listeners hear a delete for every key asked for, present or not.
    pub async fn delete_multi<S: AsRef<str>>(&self, keys: &[S]) -> Result<usize> {
        let full = self.full_keys(keys)?;
        let removed = self.provider.delete_multi(&full).await?;
        self.stats.record_deletes(removed as u64);
        for key in keys {
            self.notify(EventKind::Delete, Some(key.as_ref()));
        }
        Ok(removed)
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let full = self.full_key(key)?;
        self.provider.exists(&full).await
    }

    // == Flush ==
    /// Removes every item in the provider, across all namespaces.
    pub async fn flush(&self) -> Result<()> {
        self.provider.flush().await?;
        debug!(provider = self.provider.name(), "Cache flushed");
        self.notify(EventKind::Flush, None);
        Ok(())
    }

    // == Time To Live ==
    /// Remaining lifetime of `key`; None means it never expires.
    ///
    /// Fails with `CacheError::NotFound` for absent or expired keys.
    pub async fn get_ttl(&self, key: &str) -> Result<Option<Duration>> {
        let full = self.full_key(key)?;
        match self.provider.get_ttl(&full).await {
            Err(CacheError::NotFound(_)) => Err(CacheError::NotFound(key.to_string())),
            other => other,
        }
    }

    /// Closes the provider. Every view sharing it is closed too.
    pub async fn close(&self) -> Result<()> {
        self.provider.close().await
    }

    // == Health ==
    /// Asks the provider whether it can serve requests right now.
    pub async fn health_check(&self) -> Result<()> {
        self.provider.health_check().await
    }

    // == Stats ==
    pub async fn stats(&self) -> CacheStats {
        let counters = self.provider.counters().await;
        self.stats.snapshot(self.provider.name(), &self.namespace, counters)
    }

    /// Zeroes the facade counters and the provider's eviction and expiration
    /// counters, for every view sharing them.
    pub async fn reset_stats(&self) {
        self.stats.reset();
        self.provider.reset_counters().await;
    }

    // == Listeners ==
    /// Registers `listener` for events from this cache and every view
    /// sharing its provider.
    pub fn add_listener(&self, listener: Arc<dyn CacheListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    /// Returns false if `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // == Tags ==
    /// Stores a value and adds it to each tag group.
    pub async fn set_with_tags<T, S>(&self, key: &str, value: &T, tags: &[S], ttl: Option<Duration>) -> Result<()>
    where
        T: Serialize + ?Sized,
        S: AsRef<str>,
    {
        let full = self.full_key(key)?;
        let tags = tags
            .iter()
            .map(|tag| self.full_tag(tag.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let value = serde_json::to_value(value)?;

        self.tagging()?
            .set_with_tags(&full, value, &tags, self.resolve_ttl(ttl))
            .await?;
        self.stats.record_sets(1);
        self.notify(EventKind::Set, Some(key));
        Ok(())
    }

    /// Keys currently in the tag group, in lexicographic order.
    pub async fn get_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        let full_tag = self.full_tag(tag)?;
        let keys = self.tagging()?.keys_by_tag(&full_tag).await?;

        Ok(keys
            .iter()
            .filter_map(|full| self.strip(full))
            .map(str::to_string)
            .collect())
    }

    /// Deletes every key in the tag group. Returns how many were removed.
    ///
    /// With listeners registered, the group is read first and each member
    /// found is reported as deleted.
    pub async fn delete_by_tag(&self, tag: &str) -> Result<usize> {
        let full_tag = self.full_tag(tag)?;
        let tagging = self.tagging()?;

        let members = if self.listeners.is_empty() {
            Vec::new()
        } else {
            tagging.keys_by_tag(&full_tag).await?
        };
        let removed = tagging.delete_by_tag(&full_tag).await?;
        self.stats.record_deletes(removed as u64);

        for key in members.iter().filter_map(|full| self.strip(full)) {
            self.notify(EventKind::Delete, Some(key));
        }
        Ok(removed)
    }

    // == Lock ==
    /// Creates a lock handle named `name` with a fresh holder token.
    ///
    /// The record lives at `__lock:<namespace>:<name>`, outside the keys
    /// [`set`](Self::set) and [`delete`](Self::delete) accept, so only the
    /// lock handles can touch it. Nothing is acquired until
    /// [`DistributedLock::lock`] is called.
    pub fn lock(&self, name: &str, lease: Duration) -> Result<DistributedLock> {
        if name.is_empty() {
            return Err(CacheError::KeyInvalid("lock name must not be empty".to_string()));
        }
        let key = format!("{LOCK_KEY_PREFIX}{}", self.prefixed(name));
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::KeyInvalid(format!(
                "lock key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }
        DistributedLock::new(self.provider.clone(), key, lease)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::KeyInvalid("key must not be empty".to_string()));
    }
    if key.starts_with(RESERVED_KEY_PREFIX) {
        return Err(CacheError::KeyInvalid(format!(
            "keys starting with '{RESERVED_KEY_PREFIX}' are reserved: {key:?}"
        )));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::KeyInvalid(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.contains(NAMESPACE_SEPARATOR) {
        return Err(CacheError::KeyInvalid(format!(
            "namespace must not contain '{NAMESPACE_SEPARATOR}': {namespace:?}"
        )));
    }
    if namespace.starts_with(RESERVED_KEY_PREFIX) {
        return Err(CacheError::KeyInvalid(format!(
            "namespaces starting with '{RESERVED_KEY_PREFIX}' are reserved: {namespace:?}"
        )));
    }
    Ok(())
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvictionPolicy;
    use crate::providers::MemoryProvider;
    use serde::Deserialize;

    fn memory(max_size: usize) -> Arc<dyn Provider> {
        Arc::new(MemoryProvider::new(max_size, EvictionPolicy::Lru, Duration::from_secs(600)))
    }

    fn cache(namespace: &str) -> Cache {
        Cache::new(memory(100), namespace, Some(Duration::from_secs(3600))).unwrap()
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u32,
        name: String,
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let cache = cache("app");
        let profile = Profile { id: 7, name: "ada".into() };

        cache.set("profile", &profile, None).await.unwrap();

        let loaded: Option<Profile> = cache.get("profile").await.unwrap();
        assert_eq!(loaded, Some(profile));
    }

    #[tokio::test]
    async fn test_keys_are_prefixed_in_the_provider() {
        let provider = memory(100);
        let cache = Cache::new(provider.clone(), "app", None).unwrap();

        cache.set("k", &1, None).await.unwrap();

        assert!(provider.exists("app:k").await.unwrap());
        assert!(!provider.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_namespace_has_no_prefix() {
        let provider = memory(100);
        let cache = Cache::new(provider.clone(), "", None).unwrap();

        cache.set("k", &1, None).await.unwrap();
        assert!(provider.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_default_ttl_is_applied() {
        let cache = cache("app");

        cache.set("default", &1, None).await.unwrap();
        cache.set("zero", &1, Some(Duration::ZERO)).await.unwrap();
        cache.set("explicit", &1, Some(Duration::from_secs(5))).await.unwrap();

        let default = cache.get_ttl("default").await.unwrap().unwrap();
        assert!(default > Duration::from_secs(3500));
        let zero = cache.get_ttl("zero").await.unwrap().unwrap();
        assert!(zero > Duration::from_secs(3500));
        let explicit = cache.get_ttl("explicit").await.unwrap().unwrap();
        assert!(explicit <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_no_default_ttl_means_never() {
        let cache = Cache::new(memory(100), "app", Some(Duration::ZERO)).unwrap();
        cache.set("k", &1, None).await.unwrap();
        assert_eq!(cache.get_ttl("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_keys_are_rejected() {
        let cache = cache("app");

        assert!(matches!(cache.set("", &1, None).await, Err(CacheError::KeyInvalid(_))));
        let long = "x".repeat(MAX_KEY_LENGTH + 1);
        assert!(matches!(cache.get::<i32>(&long).await, Err(CacheError::KeyInvalid(_))));
        assert!(matches!(cache.with_namespace("a:b"), Err(CacheError::KeyInvalid(_))));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_serialization_error() {
        let cache = cache("app");
        cache.set("n", "text", None).await.unwrap();
        assert!(matches!(cache.get::<u64>("n").await, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_get_ttl_reports_caller_key() {
        let cache = cache("app");
        match cache.get_ttl("missing").await {
            Err(CacheError::NotFound(key)) => assert_eq!(key, "missing"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multi_ops_strip_prefix() {
        let cache = cache("app");

        cache.set_multi(&[("a", 1), ("b", 2)], None).await.unwrap();

        let found: HashMap<String, i32> = cache.get_multi(&["a", "b", "c"]).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found["a"], 1);

        assert_eq!(cache.delete_multi(&["a", "b", "c"]).await.unwrap(), 2);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 2);
        assert_eq!(stats.deletes, 2);
    }

    #[tokio::test]
    async fn test_stats_are_shared_across_namespaces() {
        let a = cache("a");
        let b = a.with_namespace("b").unwrap();

        a.set("x", &1, None).await.unwrap();
        b.get::<i32>("x").await.unwrap();

        let stats = a.stats().await;
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(b.stats().await.namespace, "b");
    }

    #[tokio::test]
    async fn test_tags_are_namespaced() {
        let a = cache("a");
        let b = a.with_namespace("b").unwrap();

        a.set_with_tags("k1", &1, &["grp"], None).await.unwrap();
        b.set_with_tags("k1", &2, &["grp"], None).await.unwrap();

        assert_eq!(a.get_by_tag("grp").await.unwrap(), vec!["k1"]);
        assert_eq!(a.delete_by_tag("grp").await.unwrap(), 1);

        assert_eq!(a.get::<i32>("k1").await.unwrap(), None);
        assert_eq!(b.get::<i32>("k1").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_lock_key_is_namespaced() {
        let provider = memory(100);
        let cache = Cache::new(provider.clone(), "app", None).unwrap();

        let lock = cache.lock("jobs", Duration::from_secs(5)).unwrap();
        assert_eq!(lock.key(), "__lock:app:jobs");
        assert!(matches!(cache.lock("", Duration::from_secs(5)), Err(CacheError::KeyInvalid(_))));
    }

    #[tokio::test]
    async fn test_user_keys_cannot_reach_a_held_lock() {
        let provider = memory(100);
        let cache = Cache::new(provider.clone(), "", None).unwrap();
        let holder = cache.lock("jobs", Duration::from_secs(30)).unwrap();
        assert!(holder.lock().await.unwrap().is_acquired());

        assert!(matches!(cache.delete("__lock:jobs").await, Err(CacheError::KeyInvalid(_))));
        assert!(matches!(
            cache.set("__lock:jobs", &"stolen", None).await,
            Err(CacheError::KeyInvalid(_))
        ));
        assert!(matches!(cache.with_namespace("__lock"), Err(CacheError::KeyInvalid(_))));
        assert!(!cache.delete("lock:jobs").await.unwrap());

        let rival = cache.lock("jobs", Duration::from_secs(30)).unwrap();
        assert!(!rival.lock().await.unwrap().is_acquired());
        assert!(provider.exists("__lock:jobs").await.unwrap());
        assert!(holder.unlock().await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_beyond_clock_range_never_expires() {
        let cache = cache("app");

        cache.set("k", &1, Some(Duration::MAX)).await.unwrap();

        assert_eq!(cache.get::<i32>("k").await.unwrap(), Some(1));
        assert_eq!(cache.get_ttl("k").await.unwrap(), None);
    }

    type Seen = (EventKind, String, Option<String>);

    #[derive(Default)]
    struct Recorder {
        seen: std::sync::Mutex<Vec<Seen>>,
    }

    impl CacheListener for Recorder {
        fn on_event(&self, event: &CacheEvent<'_>) {
            self.seen.lock().unwrap().push((
                event.kind,
                event.namespace.to_string(),
                event.key.map(str::to_string),
            ));
        }
    }

    fn seen(kind: EventKind, namespace: &str, key: Option<&str>) -> Seen {
        (kind, namespace.to_string(), key.map(str::to_string))
    }

    #[tokio::test]
    async fn test_listeners_hear_operations() {
        let a = cache("a");
        let b = a.with_namespace("b").unwrap();
        let recorder = Arc::new(Recorder::default());
        let id = a.add_listener(recorder.clone());

        a.set("k", &1, None).await.unwrap();
        a.get::<i32>("k").await.unwrap();
        a.get::<i32>("missing").await.unwrap();
        b.set_with_tags("t1", &2, &["grp"], None).await.unwrap();
        b.delete_by_tag("grp").await.unwrap();
        a.delete("k").await.unwrap();
        a.delete("k").await.unwrap();
        a.flush().await.unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![
                seen(EventKind::Set, "a", Some("k")),
                seen(EventKind::Get, "a", Some("k")),
                seen(EventKind::Set, "b", Some("t1")),
                seen(EventKind::Delete, "b", Some("t1")),
                seen(EventKind::Delete, "a", Some("k")),
                seen(EventKind::Flush, "a", None),
            ]
        );

        assert!(b.remove_listener(id));
        a.set("k", &1, None).await.unwrap();
        assert_eq!(recorder.seen.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_reset_stats() {
        let provider = memory(1);
        let cache = Cache::new(provider, "app", None).unwrap();

        cache.set("a", &1, None).await.unwrap();
        cache.set("b", &2, None).await.unwrap();
        cache.get::<i32>("a").await.unwrap();
        cache.get::<i32>("b").await.unwrap();
        cache.delete("b").await.unwrap();

        let before = cache.stats().await;
        assert_eq!((before.sets, before.hits, before.misses), (2, 1, 1));
        assert_eq!(before.evictions, 1);

        cache.reset_stats().await;
        let after = cache.stats().await;
        assert_eq!((after.hits, after.misses, after.sets, after.deletes), (0, 0, 0, 0));
        assert_eq!((after.evictions, after.expirations), (0, 0));
        assert_eq!(after.total_entries, Some(0));
    }

    #[tokio::test]
    async fn test_health_check_follows_provider() {
        let cache = cache("app");
        cache.health_check().await.unwrap();

        cache.close().await.unwrap();
        assert!(matches!(cache.health_check().await, Err(CacheError::Operation(_))));
    }
}

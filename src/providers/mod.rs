//! Storage Providers
//!
//! One contract, three backends. The facade talks to a provider only through
//! [`Provider`]; tagging and conditional writes are optional capabilities a
//! backend exposes through [`Provider::tagging`] and [`Provider::atomic`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub mod file;
pub mod memory;
pub mod remote;

pub use file::{FileProvider, FileProviderFactory};
pub use memory::{MemoryProvider, MemoryProviderFactory, MemoryStore};
pub use remote::{RemoteProvider, RemoteProviderFactory};

// == Provider Counters ==
/// Counters only the backend can observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCounters {
    /// Items discarded to stay under `max_size`
    pub evictions: u64,
    /// Items purged after their TTL elapsed, lazily or by a sweep
    pub expirations: u64,
    /// Current item count, None when the backend cannot tell cheaply
    pub entries: Option<usize>,
}

// == Provider Trait ==
/// The storage contract every backend implements.
///
/// Missing and expired keys are `Ok(None)` / `Ok(false)`, never errors.
/// Every operation fails with `CacheError::Operation` after [`close`](Provider::close).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend name, used in logs and statistics.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Returns only the keys that were found.
    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Value>>;

    /// Stores `value`; a `ttl` of None never expires.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Stores every pair with the same `ttl`.
    async fn set_multi(&self, items: Vec<(String, Value)>, ttl: Option<Duration>) -> Result<()> {
        for (key, value) in items {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }

    /// Returns whether the key was present.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Returns how many keys were actually removed.
    async fn delete_multi(&self, keys: &[String]) -> Result<usize>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Removes every item and every tag.
    async fn flush(&self) -> Result<()>;

    /// Remaining lifetime of `key`; None means it never expires.
    ///
    /// Fails with `CacheError::NotFound` when the key is absent or expired.
    async fn get_ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Stops background work and releases resources. Idempotent.
    async fn close(&self) -> Result<()>;

    async fn counters(&self) -> ProviderCounters;

    /// Zeroes the eviction and expiration counters.
    async fn reset_counters(&self) {}

    /// Checks that the backend can currently serve requests.
    ///
    /// Fails after [`close`](Provider::close) or when the storage behind the
    /// provider is unreachable.
    async fn health_check(&self) -> Result<()>;

    fn tagging(&self) -> Option<&dyn TagSupport> {
        None
    }

    fn atomic(&self) -> Option<&dyn AtomicSupport> {
        None
    }
}

// == Tag Capability ==
/// Group invalidation by label.
#[async_trait]
pub trait TagSupport: Send + Sync {
    /// Stores `value` and registers `key` under each tag.
    async fn set_with_tags(
        &self,
        key: &str,
        value: Value,
        tags: &[String],
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Keys currently believed to carry `tag`, in lexicographic order.
    async fn keys_by_tag(&self, tag: &str) -> Result<Vec<String>>;

    /// Deletes every key carrying `tag` and forgets the tag.
    async fn delete_by_tag(&self, tag: &str) -> Result<usize>;
}

// == Atomic Capability ==
/// Conditional writes, the primitive the distributed lock is built on.
#[async_trait]
pub trait AtomicSupport: Send + Sync {
    /// Stores `value` only if no live item exists under `key`.
    async fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> Result<bool>;

    /// Deletes `key` only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &Value) -> Result<bool>;

    /// Resets the lifetime of `key` only if it currently holds `expected`.
    async fn expire_if_equals(&self, key: &str, expected: &Value, ttl: Duration) -> Result<bool>;
}

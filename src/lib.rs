//! omnicache - A pluggable cache with interchangeable backends
//!
//! One [`Provider`] contract over an in-process table, a directory of files
//! and Redis, with TTL expiration, bounded-size eviction, namespaces, tag
//! invalidation, event listeners and a distributed lock, all reached through
//! the [`Cache`] facade.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod tasks;

pub use api::AppState;
pub use cache::{
    Cache, CacheEvent, CacheListener, CacheStats, DistributedLock, EventKind, EvictionPolicy,
    ListenerId, LockOutcome, Registry,
};
pub use config::{CacheConfig, ProviderKind, ServerConfig};
pub use error::{CacheError, Result};
pub use providers::Provider;

//! Cache Module
//!
//! The facade callers hold, plus the pieces providers are built from: items,
//! eviction policies, the tag index and statistics. Event listeners and the
//! distributed lock hang off the facade.

pub mod events;
mod facade;
mod item;
pub mod lock;
mod policy;
pub mod registry;
mod stats;
mod tags;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use events::{CacheEvent, CacheListener, EventKind, ListenerId, Listeners};
pub use facade::{Cache, LOCK_KEY_PREFIX, RESERVED_KEY_PREFIX};
pub use item::CacheItem;
pub use lock::{DistributedLock, LockOutcome, LOCK_RETRY_INTERVAL};
pub use policy::EvictionPolicy;
pub use registry::{ProviderFactory, Registry};
pub use stats::{CacheStats, StatsCollector};
pub use tags::TagIndex;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

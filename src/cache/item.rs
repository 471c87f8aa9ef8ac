//! Cache Item Module
//!
//! A stored value plus the bookkeeping the eviction policies and TTL logic read.

use std::time::{Duration, Instant};

use serde_json::Value;

// == Cache Item ==
/// A single value held by the in-process store.
#[derive(Debug, Clone)]
pub struct CacheItem {
    /// The stored value
    pub value: Value,
    /// Absolute expiry instant, None = never expires
    pub expires_at: Option<Instant>,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    /// Number of reads since creation
    pub access_count: u64,
    /// Store sequence number at creation, breaks ties between equal instants
    pub created_seq: u64,
    /// Store sequence number at the last access
    pub accessed_seq: u64,
}

impl CacheItem {
    // == Constructor ==
    /// Creates an item stamped with `now`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Lifetime from `now`, None = never expires. A lifetime past
    ///   the clock's range also never expires.
    /// * `now` - Creation instant
    /// * `seq` - Store sequence number of this write
    pub fn new(value: Value, ttl: Option<Duration>, now: Instant, seq: u64) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            created_seq: seq,
            accessed_seq: seq,
        }
    }

    // == Is Expired ==
    /// An item is expired once `now` reaches its expiry instant.
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if the item never expires.
    ///
    /// An expired item reports `Some(Duration::ZERO)`.
    pub fn ttl_remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }

    // == Touch ==
    /// Records a read.
    pub fn touch(&mut self, now: Instant, seq: u64) {
        self.last_accessed_at = now;
        self.accessed_seq = seq;
        self.access_count += 1;
    }
}

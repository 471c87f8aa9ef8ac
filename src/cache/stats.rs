//! Cache Statistics Module
//!
//! Tracks hits, misses, sets and deletes at the facade, and merges in the
//! eviction and expiration counters each provider keeps for itself.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::providers::ProviderCounters;

// == Stats Collector ==
/// Lock-free counters shared by every facade built over one provider.
#[derive(Debug, Default)]
pub struct StatsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hits(&self, n: u64) {
        self.hits.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_misses(&self, n: u64) {
        self.misses.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_sets(&self, n: u64) {
        self.sets.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_deletes(&self, n: u64) {
        self.deletes.fetch_add(n, Ordering::Relaxed);
    }

    /// Zeroes every facade counter.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Combines the facade counters with the provider's own.
    ///
    /// # Arguments
    /// * `provider` - Backend name reported in the snapshot
    /// * `namespace` - Namespace of the facade asking
    /// * `counters` - Eviction and expiration counters read from the provider
    pub fn snapshot(&self, provider: &str, namespace: &str, counters: ProviderCounters) -> CacheStats {
        CacheStats {
            provider: provider.to_string(),
            namespace: namespace.to_string(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            evictions: counters.evictions,
            expirations: counters.expirations,
            total_entries: counters.entries,
        }
    }
}

// == Cache Stats ==
/// Point-in-time view of cache performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub provider: String,
    pub namespace: String,
    /// Reads that found a live value
    pub hits: u64,
    /// Reads that found nothing (absent or expired)
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    /// Items discarded by the eviction policy
    pub evictions: u64,
    /// Items purged after their TTL elapsed
    pub expirations: u64,
    /// Items currently held, when the backend can tell cheaply
    pub total_entries: Option<usize>,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

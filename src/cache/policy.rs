//! Eviction Policy Module
//!
//! Chooses which item a bounded store discards when it is full.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::CacheItem;
use crate::error::CacheError;

// == Eviction Policy ==
/// Victim selection rule for a full store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EvictionPolicy {
    /// Least recently used: oldest last access
    #[default]
    #[serde(alias = "lru")]
    Lru,
    /// Least frequently used: fewest reads, then least recently used
    #[serde(alias = "lfu")]
    Lfu,
    /// First in, first out: oldest creation
    #[serde(alias = "fifo")]
    Fifo,
}

impl EvictionPolicy {
    // == Select Victim ==
    /// Returns the key of the item to discard, or None for an empty table.
    ///
    /// Linear scan. Equal instants are ordered by the store sequence numbers,
    /// so the choice is deterministic.
    pub fn select_victim<'a>(&self, items: &'a HashMap<String, CacheItem>) -> Option<&'a str> {
        let victim = match self {
            EvictionPolicy::Lru => items
                .iter()
                .min_by_key(|(_, item)| (item.last_accessed_at, item.accessed_seq)),
            EvictionPolicy::Lfu => items.iter().min_by_key(|(_, item)| {
                (item.access_count, item.last_accessed_at, item.accessed_seq)
            }),
            EvictionPolicy::Fifo => items
                .iter()
                .min_by_key(|(_, item)| (item.created_at, item.created_seq)),
        };

        victim.map(|(key, _)| key.as_str())
    }

    /// Returns the configuration name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "LRU",
            EvictionPolicy::Lfu => "LFU",
            EvictionPolicy::Fifo => "FIFO",
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionPolicy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRU" => Ok(EvictionPolicy::Lru),
            "LFU" => Ok(EvictionPolicy::Lfu),
            "FIFO" => Ok(EvictionPolicy::Fifo),
            other => Err(CacheError::Config(format!("unknown eviction policy: {other}"))),
        }
    }
}

//! In-Process Store
//!
//! The synchronous table behind [`MemoryProvider`](super::MemoryProvider):
//! items, tag index, eviction and expiry counters. Every method takes the
//! current instant so callers (and tests) control the clock.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::cache::{CacheItem, EvictionPolicy, TagIndex};
use crate::providers::ProviderCounters;

// == Memory Store ==
#[derive(Debug)]
pub struct MemoryStore {
    items: HashMap<String, CacheItem>,
    tags: TagIndex,
    policy: EvictionPolicy,
    /// Maximum number of items, 0 = unbounded
    max_size: usize,
    /// Monotonic write/read sequence, orders events sharing an instant
    seq: u64,
    evictions: u64,
    expirations: u64,
}

impl MemoryStore {
    // == Constructor ==
    /// # Arguments
    /// * `max_size` - Item bound, 0 for unbounded
    /// * `policy` - Victim selection rule used when the bound is reached
    pub fn new(max_size: usize, policy: EvictionPolicy) -> Self {
        Self {
            items: HashMap::new(),
            tags: TagIndex::new(),
            policy,
            max_size,
            seq: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Removes `key` if it is expired at `now`. Returns true if it was.
    fn purge_if_expired(&mut self, key: &str, now: Instant) -> bool {
        let expired = self.items.get(key).is_some_and(|item| item.is_expired(now));
        if expired {
            self.items.remove(key);
            self.tags.remove_key(key);
            self.expirations += 1;
        }
        expired
    }

    // == Get ==
    /// Returns a live value and records the access.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<Value> {
        if self.purge_if_expired(key, now) {
            return None;
        }

        let seq = self.tick();
        let item = self.items.get_mut(key)?;
        item.touch(now, seq);
        Some(item.value.clone())
    }

    // == Set ==
    /// Stores `value`, replacing any existing item and its tag memberships.
    ///
    /// A new key arriving at a full store evicts one victim first.
    pub fn set(&mut self, key: &str, value: Value, ttl: Option<Duration>, now: Instant) {
        self.insert(key, value, ttl, now);
    }

    // == Set With Tags ==
    pub fn set_with_tags(
        &mut self,
        key: &str,
        value: Value,
        tags: &[String],
        ttl: Option<Duration>,
        now: Instant,
    ) {
        self.insert(key, value, ttl, now);
        self.tags.register(key, tags);
    }

    fn insert(&mut self, key: &str, value: Value, ttl: Option<Duration>, now: Instant) {
        self.purge_if_expired(key, now);

        if self.items.contains_key(key) {
            self.tags.remove_key(key);
        } else if self.max_size > 0 && self.items.len() >= self.max_size {
            self.evict_one();
        }

        let seq = self.tick();
        self.items.insert(key.to_string(), CacheItem::new(value, ttl, now, seq));
    }

    fn evict_one(&mut self) {
        let Some(victim) = self.policy.select_victim(&self.items).map(str::to_string) else {
            return;
        };

        self.items.remove(&victim);
        self.tags.remove_key(&victim);
        self.evictions += 1;
    }

    // == Delete ==
    /// Returns whether a live item was removed.
    pub fn delete(&mut self, key: &str, now: Instant) -> bool {
        if self.purge_if_expired(key, now) {
            return false;
        }
        self.tags.remove_key(key);
        self.items.remove(key).is_some()
    }

    // == Exists ==
    /// Checks for a live item without counting it as an access.
    pub fn exists(&mut self, key: &str, now: Instant) -> bool {
        !self.purge_if_expired(key, now) && self.items.contains_key(key)
    }

    // == Time To Live ==
    /// Outer None = absent, inner None = never expires.
    pub fn ttl(&mut self, key: &str, now: Instant) -> Option<Option<Duration>> {
        if self.purge_if_expired(key, now) {
            return None;
        }
        self.items.get(key).map(|item| item.ttl_remaining(now))
    }

    // == Tags ==
    /// Live keys carrying `tag`. Expired members are purged on the way.
    pub fn keys_by_tag(&mut self, tag: &str, now: Instant) -> Vec<String> {
        self.tags
            .keys_for(tag)
            .into_iter()
            .filter(|key| !self.purge_if_expired(key, now))
            .collect()
    }

    /// Deletes every key carrying `tag`; returns how many live items went.
    pub fn delete_by_tag(&mut self, tag: &str, now: Instant) -> usize {
        let mut removed = 0;
        for key in self.tags.take_tag(tag) {
            if let Some(item) = self.items.remove(&key) {
                if item.is_expired(now) {
                    self.expirations += 1;
                } else {
                    removed += 1;
                }
            }
        }
        removed
    }

    // == Conditional Writes ==
    /// Stores `value` only when no live item exists under `key`.
    pub fn set_if_absent(&mut self, key: &str, value: Value, ttl: Duration, now: Instant) -> bool {
        if self.exists(key, now) {
            return false;
        }
        self.insert(key, value, Some(ttl), now);
        true
    }

    pub fn delete_if_equals(&mut self, key: &str, expected: &Value, now: Instant) -> bool {
        if !self.holds(key, expected, now) {
            return false;
        }
        self.tags.remove_key(key);
        self.items.remove(key).is_some()
    }

    pub fn expire_if_equals(&mut self, key: &str, expected: &Value, ttl: Duration, now: Instant) -> bool {
        if !self.holds(key, expected, now) {
            return false;
        }
        match self.items.get_mut(key) {
            Some(item) => {
                item.expires_at = now.checked_add(ttl);
                true
            }
            None => false,
        }
    }

    fn holds(&mut self, key: &str, expected: &Value, now: Instant) -> bool {
        self.exists(key, now) && self.items.get(key).is_some_and(|item| &item.value == expected)
    }

    // == Purge Expired ==
    /// Removes every expired item. Returns the number removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .items
            .iter()
            .filter(|(_, item)| item.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.items.remove(key);
            self.tags.remove_key(key);
        }

        self.expirations += expired.len() as u64;
        expired.len()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.items.clear();
        self.tags.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Zeroes the eviction and expiration counters.
    pub fn reset_counters(&mut self) {
        self.evictions = 0;
        self.expirations = 0;
    }

    pub fn counters(&self) -> ProviderCounters {
        ProviderCounters {
            evictions: self.evictions,
            expirations: self.expirations,
            entries: Some(self.items.len()),
        }
    }
}

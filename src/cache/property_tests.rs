//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against simple reference models, and the
//! facade against arbitrary values.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::{Cache, EvictionPolicy};
use crate::providers::file::file_stem;
use crate::providers::{MemoryProvider, MemoryStore};

// == Strategies ==
/// Keys drawn from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

fn tag_strategy() -> impl Strategy<Value = String> {
    "t[0-2]"
}

#[derive(Debug, Clone)]
enum StoreOp {
    Set { key: String, value: i64 },
    SetTagged { key: String, value: i64, tag: String },
    Get { key: String },
    Delete { key: String },
    DeleteTag { tag: String },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (key_strategy(), any::<i64>()).prop_map(|(key, value)| StoreOp::Set { key, value }),
        (key_strategy(), any::<i64>(), tag_strategy())
            .prop_map(|(key, value, tag)| StoreOp::SetTagged { key, value, tag }),
        key_strategy().prop_map(|key| StoreOp::Get { key }),
        key_strategy().prop_map(|key| StoreOp::Delete { key }),
        tag_strategy().prop_map(|tag| StoreOp::DeleteTag { tag }),
    ]
}

/// Same-instant operations; the store sequence alone orders them.
#[derive(Debug, Clone)]
enum AccessOp {
    Set(String),
    Get(String),
    Delete(String),
}

fn access_op_strategy() -> impl Strategy<Value = AccessOp> {
    prop_oneof![
        key_strategy().prop_map(AccessOp::Set),
        key_strategy().prop_map(AccessOp::Get),
        key_strategy().prop_map(AccessOp::Delete),
    ]
}

/// Reference model of a bounded store: a queue ordered oldest-first.
fn run_queue_model(ops: &[AccessOp], max_size: usize, reads_refresh: bool) -> HashSet<String> {
    let mut queue: VecDeque<String> = VecDeque::new();
    for op in ops {
        match op {
            AccessOp::Set(key) => {
                if let Some(pos) = queue.iter().position(|k| k == key) {
                    queue.remove(pos);
                } else if queue.len() >= max_size {
                    queue.pop_front();
                }
                queue.push_back(key.clone());
            }
            AccessOp::Get(key) => {
                if reads_refresh {
                    if let Some(pos) = queue.iter().position(|k| k == key) {
                        let key = queue.remove(pos).unwrap_or_default();
                        queue.push_back(key);
                    }
                }
            }
            AccessOp::Delete(key) => queue.retain(|k| k != key),
        }
    }
    queue.into_iter().collect()
}

fn run_store(ops: &[AccessOp], max_size: usize, policy: EvictionPolicy) -> HashSet<String> {
    let now = Instant::now();
    let mut store = MemoryStore::new(max_size, policy);
    for op in ops {
        match op {
            AccessOp::Set(key) => store.set(key, json!(key), None, now),
            AccessOp::Get(key) => {
                store.get(key, now);
            }
            AccessOp::Delete(key) => {
                store.delete(key, now);
            }
        }
    }

    let all: Vec<String> = ["a", "b", "c", "d", "e", "f"]
        .iter()
        .flat_map(|a| {
            let single = a.to_string();
            let pairs: Vec<String> = ["a", "b", "c", "d", "e", "f"]
                .iter()
                .map(|b| format!("{a}{b}"))
                .collect();
            std::iter::once(single).chain(pairs)
        })
        .collect();
    all.into_iter().filter(|k| store.exists(k, now)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Record {
    id: u64,
    name: String,
    score: Option<i32>,
    labels: Vec<String>,
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        any::<u64>(),
        "\\PC{0,32}",
        proptest::option::of(any::<i32>()),
        prop::collection::vec("[a-z]{0,8}", 0..4),
    )
        .prop_map(|(id, name, score, labels)| Record {
            id,
            name,
            score,
            labels,
        })
}

fn memory_cache(namespace: &str) -> Cache {
    let provider = Arc::new(MemoryProvider::new(0, EvictionPolicy::Lru, Duration::from_secs(600)));
    Cache::new(provider, namespace, None).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // An unbounded store behaves like a plain map.
    #[test]
    fn prop_unbounded_store_matches_map(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let now = Instant::now();
        let mut store = MemoryStore::new(0, EvictionPolicy::Lru);
        let mut model: HashMap<String, i64> = HashMap::new();
        let mut model_tags: HashMap<String, HashSet<String>> = HashMap::new();

        for op in ops {
            match op {
                StoreOp::Set { key, value } => {
                    store.set(&key, json!(value), None, now);
                    model.insert(key.clone(), value);
                    for keys in model_tags.values_mut() {
                        keys.remove(&key);
                    }
                }
                StoreOp::SetTagged { key, value, tag } => {
                    store.set_with_tags(&key, json!(value), &[tag.clone()], None, now);
                    model.insert(key.clone(), value);
                    for keys in model_tags.values_mut() {
                        keys.remove(&key);
                    }
                    model_tags.entry(tag).or_default().insert(key);
                }
                StoreOp::Get { key } => {
                    let expected = model.get(&key).map(|v| json!(v));
                    prop_assert_eq!(store.get(&key, now), expected);
                }
                StoreOp::Delete { key } => {
                    prop_assert_eq!(store.delete(&key, now), model.remove(&key).is_some());
                    for keys in model_tags.values_mut() {
                        keys.remove(&key);
                    }
                }
                StoreOp::DeleteTag { tag } => {
                    let keys = model_tags.remove(&tag).unwrap_or_default();
                    for key in &keys {
                        model.remove(key);
                        for others in model_tags.values_mut() {
                            others.remove(key);
                        }
                    }
                    prop_assert_eq!(store.delete_by_tag(&tag, now), keys.len());
                }
            }
        }

        prop_assert_eq!(store.len(), model.len());
        for (tag, keys) in &model_tags {
            let mut expected: Vec<String> = keys.iter().cloned().collect();
            expected.sort();
            prop_assert_eq!(store.keys_by_tag(tag, now), expected);
        }
    }

    // A bounded store never exceeds its bound, and every new key beyond it
    // costs exactly one eviction.
    #[test]
    fn prop_capacity_enforcement(
        max_size in 1usize..8,
        keys in prop::collection::vec(key_strategy(), 1..80)
    ) {
        let now = Instant::now();
        let mut store = MemoryStore::new(max_size, EvictionPolicy::Lru);
        let mut distinct = HashSet::new();

        for key in &keys {
            store.set(key, json!(1), None, now);
            distinct.insert(key.clone());
            prop_assert!(store.len() <= max_size);
        }

        let expected_evictions = distinct.len().saturating_sub(max_size) as u64;
        prop_assert!(store.counters().evictions >= expected_evictions);
        prop_assert_eq!(store.len(), distinct.len().min(max_size));
    }

    // LRU keeps exactly the keys a recency queue would keep.
    #[test]
    fn prop_lru_matches_recency_queue(
        max_size in 1usize..6,
        ops in prop::collection::vec(access_op_strategy(), 1..80)
    ) {
        prop_assert_eq!(
            run_store(&ops, max_size, EvictionPolicy::Lru),
            run_queue_model(&ops, max_size, true)
        );
    }

    // FIFO ignores reads: only writes reorder the queue.
    #[test]
    fn prop_fifo_matches_insertion_queue(
        max_size in 1usize..6,
        ops in prop::collection::vec(access_op_strategy(), 1..80)
    ) {
        prop_assert_eq!(
            run_store(&ops, max_size, EvictionPolicy::Fifo),
            run_queue_model(&ops, max_size, false)
        );
    }

    // Items are live strictly before their deadline and gone at it.
    #[test]
    fn prop_ttl_boundary(ttl_ms in 1u64..100_000, before in 0u64..100_000) {
        let now = Instant::now();
        let ttl = Duration::from_millis(ttl_ms);
        let mut store = MemoryStore::new(0, EvictionPolicy::Lru);
        store.set("k", json!(1), Some(ttl), now);

        let earlier = now + Duration::from_millis(before % ttl_ms);
        prop_assert!(store.exists("k", earlier));
        prop_assert!(store.get("k", now + ttl).is_none());
        prop_assert_eq!(store.counters().expirations, 1);
    }

    // Distinct keys never share a file.
    #[test]
    fn prop_file_stem_is_injective(a in "\\PC{1,80}", b in "\\PC{1,80}") {
        prop_assume!(a != b);
        prop_assert_ne!(file_stem(&a), file_stem(&b));
    }

    // Arbitrary serializable values come back equal through the facade.
    #[test]
    fn prop_facade_round_trip(key in "[a-zA-Z0-9][a-zA-Z0-9_]{0,63}", record in record_strategy()) {
        let cache = memory_cache("prop");
        let loaded: Option<Record> = tokio_test::block_on(async {
            cache.set(&key, &record, None).await.unwrap();
            cache.get(&key).await.unwrap()
        });
        prop_assert_eq!(loaded, Some(record));
    }

    // Writes in one namespace are invisible in another.
    #[test]
    fn prop_namespace_isolation(key in "[a-z]{1,16}", left in any::<i64>(), right in any::<i64>()) {
        let a = memory_cache("a");
        let b = a.with_namespace("b").unwrap();

        let (from_a, from_b) = tokio_test::block_on(async {
            a.set(&key, &left, None).await.unwrap();
            b.set(&key, &right, None).await.unwrap();
            (
                a.get::<i64>(&key).await.unwrap(),
                b.get::<i64>(&key).await.unwrap(),
            )
        });
        prop_assert_eq!(from_a, Some(left));
        prop_assert_eq!(from_b, Some(right));
    }
}

// == Additional Unit Tests for Edge Cases ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_model_lru_example() {
        let ops = vec![
            AccessOp::Set("a".into()),
            AccessOp::Set("b".into()),
            AccessOp::Get("a".into()),
            AccessOp::Set("c".into()),
        ];
        let kept: HashSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(run_queue_model(&ops, 2, true), kept);
        assert_eq!(run_store(&ops, 2, EvictionPolicy::Lru), kept);
    }
}

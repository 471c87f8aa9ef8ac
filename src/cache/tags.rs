//! Tag Index Module
//!
//! Maps tags to the keys carrying them, and keys back to their tags, so a
//! removed key can be dropped from every group in one step.

use std::collections::{BTreeSet, HashMap};

// == Tag Index ==
#[derive(Debug, Default)]
pub struct TagIndex {
    /// tag -> keys, ordered lexicographically
    by_tag: HashMap<String, BTreeSet<String>>,
    /// key -> tags
    by_key: HashMap<String, BTreeSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Adds `key` to each of `tags`.
    pub fn register<I, S>(&mut self, key: &str, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for tag in tags {
            let tag = tag.as_ref();
            self.by_tag
                .entry(tag.to_string())
                .or_default()
                .insert(key.to_string());
            self.by_key
                .entry(key.to_string())
                .or_default()
                .insert(tag.to_string());
        }
    }

    // == Remove Key ==
    /// Drops `key` from every tag referencing it. Empty tags are removed.
    pub fn remove_key(&mut self, key: &str) {
        let Some(tags) = self.by_key.remove(key) else {
            return;
        };

        for tag in tags {
            if let Some(keys) = self.by_tag.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(&tag);
                }
            }
        }
    }

    // == Keys For ==
    /// Returns the keys currently indexed under `tag`, in order.
    pub fn keys_for(&self, tag: &str) -> Vec<String> {
        self.by_tag
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the tags recorded for `key`.
    pub fn tags_of(&self, key: &str) -> Vec<String> {
        self.by_key
            .get(key)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    // == Take Tag ==
    /// Removes `tag` and returns its keys. The keys are also dropped from any
    /// other tag, since the caller is about to delete them.
    pub fn take_tag(&mut self, tag: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .by_tag
            .remove(tag)
            .map(|keys| keys.into_iter().collect())
            .unwrap_or_default();

        for key in &keys {
            self.remove_key(key);
        }
        keys
    }

    pub fn clear(&mut self) {
        self.by_tag.clear();
        self.by_key.clear();
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

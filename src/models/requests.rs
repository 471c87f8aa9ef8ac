//! Request DTOs
//!
//! Incoming HTTP request bodies.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

/// Body of `PUT /set`.
///
/// # Fields
/// - `key`: Key inside the server's namespace
/// - `value`: Any JSON value
/// - `ttl`: Lifetime in seconds; absent or `0` means the configured default
/// - `tags`: Tags to attach; requires a provider with tag support
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    pub value: Value,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl SetRequest {
    /// Lifetime to hand to the facade.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl.map(Duration::from_secs)
    }

    /// Non-empty tag list, if any.
    pub fn tags(&self) -> Option<&[String]> {
        self.tags.as_deref().filter(|tags| !tags.is_empty())
    }
}

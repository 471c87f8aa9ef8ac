//! Response DTOs
//!
//! Outgoing HTTP response bodies. Errors are rendered by
//! [`CacheError`](crate::error::CacheError) itself.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;

/// Body of `GET /get/:key`.
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Value,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Body of `PUT /set`.
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    pub message: String,
    pub key: String,
}

impl SetResponse {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Body of `DELETE /del/:key`.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub key: String,
    /// False when the key was already absent
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(key: impl Into<String>, deleted: bool) -> Self {
        Self {
            key: key.into(),
            deleted,
        }
    }
}

/// Body of `GET /ttl/:key`.
#[derive(Debug, Clone, Serialize)]
pub struct TtlResponse {
    pub key: String,
    /// Remaining lifetime in milliseconds; `null` for a key that never expires
    pub ttl_ms: Option<u64>,
}

impl TtlResponse {
    pub fn new(key: impl Into<String>, ttl: Option<std::time::Duration>) -> Self {
        Self {
            key: key.into(),
            ttl_ms: ttl.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

/// Body of `GET /tags/:tag`.
#[derive(Debug, Clone, Serialize)]
pub struct TagKeysResponse {
    pub tag: String,
    pub keys: Vec<String>,
}

/// Body of `DELETE /tags/:tag`.
#[derive(Debug, Clone, Serialize)]
pub struct TagDeleteResponse {
    pub tag: String,
    pub deleted: usize,
}

/// Body of `GET /stats`: the facade snapshot plus the derived hit rate.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

impl From<CacheStats> for StatsResponse {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Body of `GET /health`.
///
/// A healthy backend reports its statistics under `details`; a failing one
/// reports the error instead.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    /// RFC 3339
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<StatsResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn healthy(provider: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            status: "healthy".to_string(),
            provider: provider.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: Some(StatsResponse::from(stats)),
            error: None,
        }
    }

    pub fn unhealthy(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            provider: provider.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            details: None,
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_get_response_keeps_json_shape() {
        let resp = GetResponse::new("k", json!([1, 2, 3]));
        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body, json!({"key": "k", "value": [1, 2, 3]}));
    }

    #[test]
    fn test_ttl_response_in_millis() {
        let body = serde_json::to_value(TtlResponse::new("k", Some(Duration::from_secs(2)))).unwrap();
        assert_eq!(body["ttl_ms"], 2000);

        let body = serde_json::to_value(TtlResponse::new("k", None)).unwrap();
        assert!(body["ttl_ms"].is_null());
    }

    #[test]
    fn test_stats_response_is_flat() {
        let stats = CacheStats {
            provider: "memory".to_string(),
            namespace: "app".to_string(),
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        let body = serde_json::to_value(StatsResponse::from(stats)).unwrap();
        assert_eq!(body["provider"], "memory");
        assert_eq!(body["hits"], 3);
        assert!((body["hit_rate"].as_f64().unwrap() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_health_response_serialize() {
        let body = serde_json::to_value(HealthResponse::healthy("file", CacheStats::default())).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["provider"], "file");
        assert!(body["timestamp"].is_string());
        assert_eq!(body["details"]["hits"], 0);
        assert!(body.get("error").is_none());

        let body = serde_json::to_value(HealthResponse::unhealthy("remote", "refused")).unwrap();
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["error"], "refused");
        assert!(body.get("details").is_none());
    }
}

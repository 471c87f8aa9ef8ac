//! Error types for the cache
//!
//! One taxonomy shared by every provider, the facade and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Empty or malformed key
    #[error("Invalid key: {0}")]
    KeyInvalid(String),

    /// Missing or invalid settings at construction time
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend unreachable or timed out
    #[error("Connection error: {0}")]
    Connection(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend-specific failure on set/delete/flush
    #[error("Operation failed: {0}")]
    Operation(String),

    /// The backend does not offer the requested capability
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl CacheError {
    /// Returns true when retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Connection(_))
    }

    /// Returns true for the expected "key absent" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

// == Conversions ==
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Operation(err.to_string())
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Operation(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(err: toml::de::Error) -> Self {
        CacheError::Config(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::KeyInvalid(_) | CacheError::Serialization(_) => StatusCode::BAD_REQUEST,
            CacheError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            CacheError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Config(_) | CacheError::Operation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

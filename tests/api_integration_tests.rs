//! Integration Tests for API Endpoints
//!
//! Full request/response cycles through the router, over both the memory and
//! the file provider.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use omnicache::api::{create_router, AppState};
use omnicache::config::FileConfig;
use omnicache::providers::{FileProvider, MemoryProvider};
use omnicache::{Cache, EvictionPolicy};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    let provider = Arc::new(MemoryProvider::new(100, EvictionPolicy::Lru, Duration::from_secs(600)));
    let cache = Cache::new(provider, "it", None).unwrap();
    create_router(AppState::new(cache))
}

async fn create_file_app(dir: &TempDir) -> Router {
    let config = FileConfig {
        dir_path: dir.path().to_path_buf(),
        ..FileConfig::default()
    };
    let provider = Arc::new(FileProvider::open(&config).await.unwrap());
    let cache = Cache::new(provider, "it", None).unwrap();
    create_router(AppState::new(cache))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// == SET / GET / DELETE ==

#[tokio::test]
async fn test_set_then_get_structured_value() {
    let app = create_test_app();

    let (status, json) = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "user", "value": {"name": "ada", "langs": ["en", "fr"]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("user"));

    let (status, json) = send(&app, "GET", "/get/user", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], json!({"name": "ada", "langs": ["en", "fr"]}));
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/get/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_delete_endpoint() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "gone", "value": 1}))).await;

    let (status, json) = send(&app, "DELETE", "/del/gone", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], true);

    let (status, json) = send(&app, "DELETE", "/del/gone", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], false);

    let (status, _) = send(&app, "GET", "/get/gone", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// == TTL ==

#[tokio::test]
async fn test_ttl_endpoint() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "short", "value": 1, "ttl": 60}))).await;
    send(&app, "PUT", "/set", Some(json!({"key": "forever", "value": 1}))).await;

    let (status, json) = send(&app, "GET", "/ttl/short", None).await;
    assert_eq!(status, StatusCode::OK);
    let remaining = json["ttl_ms"].as_u64().unwrap();
    assert!(remaining > 55_000 && remaining <= 60_000);

    let (status, json) = send(&app, "GET", "/ttl/forever", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["ttl_ms"].is_null());

    let (status, _) = send(&app, "GET", "/ttl/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "ttl_test", "value": "expires_soon", "ttl": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/get/ttl_test", None).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (status, _) = send(&app, "GET", "/get/ttl_test", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ttl_beyond_clock_range_is_accepted() {
    let app = create_test_app();

    let (status, _) = send(
        &app,
        "PUT",
        "/set",
        Some(json!({"key": "long", "value": 1, "ttl": u64::MAX})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "GET", "/get/long", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], 1);

    let (_, json) = send(&app, "GET", "/ttl/long", None).await;
    assert!(json["ttl_ms"].is_null());
}

// == Tags ==

#[tokio::test]
async fn test_tag_endpoints() {
    let app = create_test_app();
    for key in ["p1", "p2"] {
        send(&app, "PUT", "/set", Some(json!({"key": key, "value": key, "tags": ["page"]}))).await;
    }
    send(&app, "PUT", "/set", Some(json!({"key": "other", "value": 0}))).await;

    let (status, json) = send(&app, "GET", "/tags/page", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["keys"], json!(["p1", "p2"]));

    let (status, json) = send(&app, "DELETE", "/tags/page", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], 2);

    let (status, _) = send(&app, "GET", "/get/p1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/get/other", None).await;
    assert_eq!(status, StatusCode::OK);
}

// == FLUSH / STATS / HEALTH ==

#[tokio::test]
async fn test_flush_endpoint() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "a", "value": 1}))).await;

    let (status, _) = send(&app, "POST", "/flush", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/get/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    send(&app, "PUT", "/set", Some(json!({"key": "stats_key", "value": "v"}))).await;
    send(&app, "GET", "/get/stats_key", None).await;
    send(&app, "GET", "/get/nonexistent", None).await;

    let (status, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["provider"], "memory");
    assert_eq!(json["namespace"], "it");
    assert_eq!(json["hits"].as_u64().unwrap(), 1);
    assert_eq!(json["misses"].as_u64().unwrap(), 1);
    assert_eq!(json["sets"].as_u64().unwrap(), 1);
    assert_eq!(json["total_entries"].as_u64().unwrap(), 1);
    assert!((json["hit_rate"].as_f64().unwrap() - 0.5).abs() < 0.001);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

#[tokio::test]
async fn test_stats_reset_endpoint() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "a", "value": 1}))).await;
    send(&app, "GET", "/get/a", None).await;
    send(&app, "GET", "/get/missing", None).await;

    let (status, _) = send(&app, "POST", "/stats/reset", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = send(&app, "GET", "/stats", None).await;
    assert_eq!(json["hits"], 0);
    assert_eq!(json["misses"], 0);
    assert_eq!(json["sets"], 0);
    assert_eq!(json["total_entries"], 1);
}

#[tokio::test]
async fn test_health_reports_unusable_file_backend() {
    let dir = TempDir::new().unwrap();
    let app = create_file_app(&dir).await;

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["details"]["provider"], "file");

    std::fs::remove_dir_all(dir.path()).unwrap();

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], "unhealthy");
    assert!(json["error"].is_string());
}

// == Error Responses ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"invalid json"#))
                .unwrap(),
        )
        .await
        .unwrap();

    // Axum rejects malformed JSON with 400 or 422
    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/set", Some(json!({"key": "", "value": "test"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_reserved_key_request() {
    let app = create_test_app();

    let (status, _) = send(&app, "PUT", "/set", Some(json!({"key": "__lock:jobs", "value": 1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "DELETE", "/del/__lock:jobs", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// == File Provider ==

#[tokio::test]
async fn test_file_backend_round_trip() {
    let dir = TempDir::new().unwrap();
    let app = create_file_app(&dir).await;

    send(&app, "PUT", "/set", Some(json!({"key": "doc", "value": [1, 2], "tags": ["docs"]}))).await;

    let (status, json) = send(&app, "GET", "/get/doc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["value"], json!([1, 2]));

    let (_, json) = send(&app, "GET", "/tags/docs", None).await;
    assert_eq!(json["keys"], json!(["doc"]));

    let (_, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(json["provider"], "file");

    let (_, json) = send(&app, "GET", "/stats", None).await;
    assert!(json["total_entries"].is_null());
}

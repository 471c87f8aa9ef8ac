//! API Handlers
//!
//! One handler per endpoint. Errors surface through `CacheError`'s
//! `IntoResponse` impl.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use crate::cache::Cache;
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse, StatsResponse,
    TagDeleteResponse, TagKeysResponse, TtlResponse,
};

/// Application state shared across all handlers.
///
/// The facade is cheap to clone and synchronizes internally.
#[derive(Clone)]
pub struct AppState {
    pub cache: Cache,
}

impl AppState {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

/// Handler for PUT /set
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    match req.tags() {
        Some(tags) => {
            state
                .cache
                .set_with_tags(&req.key, &req.value, tags, req.ttl())
                .await?
        }
        None => state.cache.set(&req.key, &req.value, req.ttl()).await?,
    }

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Absent and expired keys are a 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get_value(&key)
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.cache.delete(&key).await?;
    Ok(Json(DeleteResponse::new(key, deleted)))
}

/// Handler for GET /ttl/:key
pub async fn ttl_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TtlResponse>> {
    let ttl = state.cache.get_ttl(&key).await?;
    Ok(Json(TtlResponse::new(key, ttl)))
}

/// Handler for GET /tags/:tag
pub async fn tag_keys_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<TagKeysResponse>> {
    let keys = state.cache.get_by_tag(&tag).await?;
    Ok(Json(TagKeysResponse { tag, keys }))
}

/// Handler for DELETE /tags/:tag
pub async fn tag_delete_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<TagDeleteResponse>> {
    let deleted = state.cache.delete_by_tag(&tag).await?;
    Ok(Json(TagDeleteResponse { tag, deleted }))
}

/// Handler for POST /flush
pub async fn flush_handler(State(state): State<AppState>) -> Result<StatusCode> {
    state.cache.flush().await?;
    info!(provider = state.cache.provider_name(), "Flushed via API");
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.cache.stats().await))
}

/// Handler for POST /stats/reset
pub async fn stats_reset_handler(State(state): State<AppState>) -> StatusCode {
    state.cache.reset_stats().await;
    info!(provider = state.cache.provider_name(), "Statistics reset via API");
    StatusCode::NO_CONTENT
}

/// Handler for GET /health
///
/// Runs the provider's own check; a failing backend is a 503.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let provider = state.cache.provider_name();
    match state.cache.health_check().await {
        Ok(()) => {
            let stats = state.cache.stats().await;
            (StatusCode::OK, Json(HealthResponse::healthy(provider, stats)))
        }
        Err(e) => {
            warn!(provider, "Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::unhealthy(provider, e.to_string())),
            )
        }
    }
}

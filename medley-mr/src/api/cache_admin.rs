//! Cache administration endpoints

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::api::ApiResult;
use crate::cache::CacheStats;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EvictionResponse {
    pub removed: u64,
}

/// GET /cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> ApiResult<Json<CacheStats>> {
    Ok(Json(state.cache.stats().await?))
}

/// POST /cache/cleanup, sweeps expired rows
pub async fn cache_cleanup(State(state): State<AppState>) -> ApiResult<Json<EvictionResponse>> {
    let removed = state.cache.cleanup().await?;
    info!(removed, "Cache cleanup");
    Ok(Json(EvictionResponse { removed }))
}

/// DELETE /cache/source/{source}
pub async fn cache_delete_source(
    State(state): State<AppState>,
    Path(source): Path<String>,
) -> ApiResult<Json<EvictionResponse>> {
    let removed = state.cache.delete_by_source(&source).await?;
    info!(source = %source, removed, "Source-scoped cache eviction");
    Ok(Json(EvictionResponse { removed }))
}

pub fn cache_routes() -> Router<AppState> {
    Router::new()
        .route("/cache/stats", get(cache_stats))
        .route("/cache/cleanup", post(cache_cleanup))
        .route("/cache/source/:source", delete(cache_delete_source))
}

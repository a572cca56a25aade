//! Cache management routes

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use geospy_core::CacheStats;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{CacheOverviewResponse, CleanupResponse, CleanupStatus, ClearResponse};

/// GET /api/v1/cache/stats
async fn all_stats(State(state): State<AppState>) -> Json<CacheOverviewResponse> {
    let caches = &state.caches;
    let cleanup = CleanupStatus {
        running: caches.is_cleanup_running(),
        interval_seconds: caches.cleanup_interval().map(|i| i.as_secs_f64()),
        last_sweep: caches.last_sweep(),
    };

    Json(CacheOverviewResponse::new(caches.get_all_stats(), cleanup))
}

/// GET /api/v1/cache/{name}/stats
async fn cache_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CacheStats>, ApiError> {
    state
        .caches
        .stats_for(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Cache not found: {}", name)))
}

/// DELETE /api/v1/cache
async fn clear_all(State(state): State<AppState>) -> Json<ClearResponse> {
    info!("Clearing all caches");

    let cleared = state.caches.clear_all_caches();
    Json(ClearResponse { cleared })
}

/// DELETE /api/v1/cache/{name}
async fn clear_cache(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    info!("Clearing cache '{}'", name);

    let cleared = state.caches.clear_cache(&name)?;
    Ok(Json(ClearResponse { cleared }))
}

/// POST /api/v1/cache/cleanup
async fn cleanup(State(state): State<AppState>) -> Json<CleanupResponse> {
    info!("Running cache cleanup");

    let cleaned = state.caches.cleanup_all();
    Json(CleanupResponse { cleaned })
}

/// Create cache routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/cache/stats", get(all_stats))
        .route("/api/v1/cache", delete(clear_all))
        .route("/api/v1/cache/cleanup", post(cleanup))
        .route("/api/v1/cache/{name}", delete(clear_cache))
        .route("/api/v1/cache/{name}/stats", get(cache_stats))
}

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::dto::CacheStatsResponse;
use crate::state::AppState;

pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        proximity: state.analyzer.cache().stats(),
        tiles: state.tile_cache.stats(),
    })
}

/// Drop every cached report and tile, returning the emptied statistics.
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    tracing::info!("Clearing proximity and tile caches");
    state.analyzer.cache().clear();
    state.tile_cache.clear();
    Json(CacheStatsResponse {
        proximity: state.analyzer.cache().stats(),
        tiles: state.tile_cache.stats(),
    })
}

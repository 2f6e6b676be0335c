use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        .route("/api/v1/health", get(handlers::health_check))

        // Proximity analysis
        .route("/api/v1/proximity/analyze", post(handlers::analyze_proximity))
        .route("/api/v1/proximity/validate-point", get(handlers::validate_point))
        .route("/api/v1/proximity/radius-recommendations", get(handlers::radius_recommendations))
        .route("/api/v1/proximity/infrastructure-types", get(handlers::infrastructure_types))

        // Land-use raster
        .route("/api/v1/mapbiomas/tiles/{z}/{x}/{y}", get(handlers::get_tile))
        .route("/api/v1/mapbiomas/metadata", get(handlers::get_metadata))
        .route("/api/v1/mapbiomas/bounds", get(handlers::get_bounds))
        .route("/api/v1/mapbiomas/classes", get(handlers::get_classes))

        // Caches
        .route("/api/v1/cache/stats", get(handlers::cache_stats))
        .route("/api/v1/cache", delete(handlers::clear_cache))

        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

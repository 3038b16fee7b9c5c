/// Application routes configuration
use crate::handlers::{
    analyze_from_satellite, feature_flags, health, invalidate_snapshot, AppState,
};
use axum::{
    routing::{delete, get, post},
    Router,
};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        .route("/api/feature-flags", get(feature_flags))
        // Soil analysis
        .route(
            "/api/soil-analysis/analyze-from-satellite",
            post(analyze_from_satellite),
        )
        .route(
            "/api/soil-analysis/satellite-cache",
            delete(invalidate_snapshot),
        )
        .with_state(state)
}

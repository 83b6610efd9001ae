//! API routes

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppState};
use super::live;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Reading ingestion and history
        .route("/api/v1/readings", post(handlers::ingest_reading))
        .route(
            "/api/v1/subjects/:subject_id/readings",
            get(handlers::list_readings),
        )

        // Alerts
        .route(
            "/api/v1/subjects/:subject_id/alerts",
            get(handlers::list_subject_alerts),
        )
        .route("/api/v1/alerts/unresolved", get(handlers::list_unresolved_alerts))
        .route("/api/v1/alerts/:alert_id/resolve", post(handlers::resolve_alert))

        // Settings
        .route(
            "/api/v1/subjects/:subject_id/settings",
            get(handlers::get_settings).put(handlers::put_settings),
        )

        // Live channel
        .route("/api/v1/live", get(live::live_handler))

        .with_state(state)
}

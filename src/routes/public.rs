use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints any client may call. Everything here reads the last published
/// dataset; none of them reach a remote source directly.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for monitoring.
        .route("/health", get(|| async { "ok" }))
        // GET /status
        // Scheduler state and the layer that served the current dataset.
        .route("/status", get(handlers::get_status))
        // GET /dataset
        // Both collections in one response, as last rendered.
        .route("/dataset", get(handlers::get_dataset))
        // GET /announcements?search=...
        .route("/announcements", get(handlers::get_announcements))
        // GET /resources?search=...
        .route("/resources", get(handlers::get_resources))
        // POST /activity
        // Interaction ping from the UI; feeds the inactivity gate.
        .route("/activity", post(handlers::record_activity))
        // GET /session
        .route("/session", get(handlers::get_session))
}

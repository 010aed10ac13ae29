use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Mounted under `/admin`. Login needs a live structured store; the create
/// endpoints additionally need a signed-in admin and answer 403 otherwise.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/login
        .route("/login", post(handlers::login))
        // POST /admin/logout
        // Always succeeds; clears the persisted session slot.
        .route("/logout", post(handlers::logout))
        // POST /admin/announcements
        // Writes through the structured store, then refreshes once.
        .route("/announcements", post(handlers::create_announcement))
        // POST /admin/resources
        .route("/resources", post(handlers::create_resource))
}

use axum::{Router, http::HeaderName};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Data acquisition: structured store, REST fallback, local snapshot.
pub mod pipeline;
pub mod rest;
pub mod snapshot;
pub mod structured;

// Scheduling, admin session and view output.
pub mod board;
pub mod credentials;
pub mod renderer;
pub mod scheduler;
pub mod session;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

pub mod routes;
use routes::{admin, public};

// --- Public Re-exports ---

pub use board::{Board, BoardParts};
pub use config::AppConfig;
pub use error::{AdminActionError, AuthError, BoardError};

/// ApiDoc
///
/// OpenAPI document for every board endpoint, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_dataset, handlers::get_announcements, handlers::get_resources,
        handlers::record_activity, handlers::get_session, handlers::get_status,
        handlers::login, handlers::logout, handlers::create_announcement,
        handlers::create_resource
    ),
    components(
        schemas(
            models::AnnouncementRecord, models::ResourceRecord, models::DataSet,
            models::DataSource, models::NewAnnouncementRequest, models::NewResourceRequest,
            models::LoginRequest, models::SessionView, handlers::BoardStatus,
        )
    ),
    tags(
        (name = "content-board", description = "Announcements and resources board API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared by every request. The board owns all mutable state, including the
/// configuration it was built from.
#[derive(Clone)]
pub struct AppState {
    pub board: Arc<Board>,
}

impl AppState {
    pub fn new(board: Arc<Board>) -> Self {
        Self { board }
    }
}

/// create_router
///
/// Public and admin routes, the Swagger UI, and the request-id/trace layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Admin checks run inside the board's gate; one session per process.
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one HTTP request, tagged with its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

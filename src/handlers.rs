use crate::{
    AppState,
    error::{AdminActionError, AuthError},
    models::{
        self, AnnouncementRecord, DataSet, DataSource, LoginRequest, NewAnnouncementRequest,
        NewResourceRequest, ResourceRecord, SessionView,
    },
    scheduler::SchedulerState,
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Filter Structs ---

/// SearchFilter
///
/// Optional case-insensitive search over the published records.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct SearchFilter {
    pub search: Option<String>,
}

/// BoardStatus
///
/// Observability view: scheduler state and which layer served the current data.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoardStatus {
    pub scheduler: SchedulerState,
    pub source: Option<DataSource>,
    pub revision: Option<u64>,
    pub signed_in: bool,
}

// --- Public Handlers ---

/// get_dataset
///
/// [Public Route] The most recently published dataset. 503 until the first refresh completes.
#[utoipa::path(
    get,
    path = "/dataset",
    responses(
        (status = 200, description = "Current dataset", body = DataSet),
        (status = 503, description = "No dataset published yet")
    )
)]
pub async fn get_dataset(State(state): State<AppState>) -> Result<Json<DataSet>, StatusCode> {
    state
        .board
        .dataset()
        .map(Json)
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

/// get_announcements
#[utoipa::path(
    get,
    path = "/announcements",
    params(SearchFilter),
    responses((status = 200, description = "Announcements, pinned first", body = [AnnouncementRecord]))
)]
pub async fn get_announcements(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> Json<Vec<AnnouncementRecord>> {
    let items = state.board.dataset().map(|d| d.announcements).unwrap_or_default();
    match filter.search {
        Some(query) => Json(models::filter_announcements(&items, &query)),
        None => Json(items),
    }
}

/// get_resources
#[utoipa::path(
    get,
    path = "/resources",
    params(SearchFilter),
    responses((status = 200, description = "Resources", body = [ResourceRecord]))
)]
pub async fn get_resources(
    State(state): State<AppState>,
    Query(filter): Query<SearchFilter>,
) -> Json<Vec<ResourceRecord>> {
    let items = state.board.dataset().map(|d| d.resources).unwrap_or_default();
    match filter.search {
        Some(query) => Json(models::filter_resources(&items, &query)),
        None => Json(items),
    }
}

/// record_activity
///
/// [Public Route] User-interaction ping. Keeps background refresh active; after
/// a long idle period it also triggers an immediate refresh.
#[utoipa::path(
    post,
    path = "/activity",
    responses((status = 204, description = "Recorded"))
)]
pub async fn record_activity(State(state): State<AppState>) -> StatusCode {
    state.board.interaction_ping().await;
    StatusCode::NO_CONTENT
}

/// get_session
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "Admin session state", body = SessionView))
)]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.board.session())
}

/// get_status
#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Scheduler and source state", body = BoardStatus))
)]
pub async fn get_status(State(state): State<AppState>) -> Json<BoardStatus> {
    let dataset = state.board.dataset();
    Json(BoardStatus {
        scheduler: state.board.scheduler.state(),
        source: dataset.as_ref().map(|d| d.source),
        revision: dataset.as_ref().map(|d| d.revision),
        signed_in: state.board.gate.is_signed_in(),
    })
}

// --- Admin Handlers ---

/// login
///
/// [Admin Route] Checks the id/password pair against the local credential store.
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionView),
        (status = 401, description = "Unknown id or wrong password"),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionView>, AuthError> {
    state
        .board
        .submit_login(&payload.id, &payload.password)
        .await
        .map(Json)
}

/// logout
#[utoipa::path(
    post,
    path = "/admin/logout",
    responses((status = 200, description = "Signed out", body = SessionView))
)]
pub async fn logout(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.board.submit_logout().await)
}

/// create_announcement
///
/// [Admin Route] Publishes an announcement through the structured store.
#[utoipa::path(
    post,
    path = "/admin/announcements",
    request_body = NewAnnouncementRequest,
    responses(
        (status = 201, description = "Created", body = AnnouncementRecord),
        (status = 403, description = "Not signed in"),
        (status = 503, description = "Store not initialized")
    )
)]
pub async fn create_announcement(
    State(state): State<AppState>,
    Json(payload): Json<NewAnnouncementRequest>,
) -> Result<(StatusCode, Json<AnnouncementRecord>), AdminActionError> {
    let record = state.board.submit_create_announcement(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// create_resource
#[utoipa::path(
    post,
    path = "/admin/resources",
    request_body = NewResourceRequest,
    responses(
        (status = 201, description = "Created", body = ResourceRecord),
        (status = 403, description = "Not signed in"),
        (status = 503, description = "Store not initialized")
    )
)]
pub async fn create_resource(
    State(state): State<AppState>,
    Json(payload): Json<NewResourceRequest>,
) -> Result<(StatusCode, Json<ResourceRecord>), AdminActionError> {
    let record = state.board.submit_create_resource(payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

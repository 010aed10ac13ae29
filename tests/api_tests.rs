mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use common::{announcement, live_config, resource};
use content_board::{
    AppConfig, AppState, Board, BoardParts, create_router,
    credentials::hash_password,
    handlers::BoardStatus,
    models::{
        AdminCredential, AnnouncementRecord, DataSet, DataSource, LoginRequest,
        NewAnnouncementRequest, SessionView,
    },
    renderer::RecordingRenderer,
    rest::MockRestSource,
    scheduler::SchedulerState,
    session::MemorySessionSlot,
    snapshot::MockSnapshot,
    structured::{MockConnector, MockStore},
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

struct TestBoard {
    state: AppState,
    store: Arc<MockStore>,
    renderer: Arc<RecordingRenderer>,
}

impl TestBoard {
    fn app(&self) -> Router {
        create_router(self.state.clone())
    }
}

async fn board(config: AppConfig) -> TestBoard {
    let store = Arc::new(MockStore::new(
        vec![
            announcement("plain", false, "2024-05-01"),
            announcement("pinned", true, "2023-01-01"),
        ],
        vec![resource("guide")],
    ));
    let renderer = Arc::new(RecordingRenderer::new());
    let snapshot = MockSnapshot::new(vec![announcement("local", false, "2020-01-01")], vec![])
        .with_credentials(vec![AdminCredential {
            id: "alice".to_string(),
            password_hash: hash_password("correct"),
        }]);

    let board = Board::assemble(BoardParts {
        config,
        connector: Arc::new(MockConnector::new(store.clone())),
        rest: Arc::new(MockRestSource::new_failing()),
        snapshot: Arc::new(snapshot),
        slot: Arc::new(MemorySessionSlot::new()),
        renderer: renderer.clone(),
    })
    .await;

    TestBoard {
        state: AppState::new(Arc::new(board)),
        store,
        renderer,
    }
}

/// A board whose first scheduler tick has reached the structured store.
async fn live_board() -> TestBoard {
    let b = board(AppConfig {
        store: live_config(),
        ..Default::default()
    })
    .await;
    b.state.board.scheduler.tick(true).await;
    b
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json<T: serde::Serialize>(uri: &str, payload: &T) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap()
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

async fn sign_in(b: &TestBoard) {
    let login = LoginRequest {
        id: "alice".to_string(),
        password: "correct".to_string(),
    };
    let response = b.app().oneshot(post_json("/admin/login", &login)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// --- Public Routes ---

#[tokio::test]
async fn test_health_check() {
    let b = board(AppConfig::default()).await;

    let response = b.app().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_dataset_unavailable_before_first_refresh() {
    let b = board(AppConfig::default()).await;

    let response = b.app().oneshot(get("/dataset")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_dataset_sorted_from_structured_store() {
    let b = live_board().await;

    let response = b.app().oneshot(get("/dataset")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let dataset: DataSet = read_json(response).await;
    assert_eq!(dataset.source, DataSource::Structured);
    assert_eq!(dataset.announcements[0].id, "pinned");
    assert_eq!(dataset.resources[0].id, "guide");
}

#[tokio::test]
async fn test_unconfigured_board_serves_local_snapshot() {
    let b = board(AppConfig::default()).await;
    b.state.board.scheduler.tick(true).await;

    let response = b.app().oneshot(get("/status")).await.unwrap();
    let status: BoardStatus = read_json(response).await;

    assert_eq!(status.scheduler, SchedulerState::Retrying);
    assert_eq!(status.source, Some(DataSource::Local));
    assert!(!status.signed_in);
}

#[tokio::test]
async fn test_announcement_search() {
    let b = live_board().await;
    b.store.replace_announcements(vec![
        AnnouncementRecord {
            id: "lab".to_string(),
            title: "Lab closed".to_string(),
            ..Default::default()
        },
        AnnouncementRecord {
            id: "exam".to_string(),
            title: "Exam".to_string(),
            ..Default::default()
        },
    ]);
    b.state.board.pipeline.refresh().await;

    let response = b
        .app()
        .oneshot(get("/announcements?search=LAB"))
        .await
        .unwrap();
    let items: Vec<AnnouncementRecord> = read_json(response).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "lab");
}

#[tokio::test]
async fn test_activity_ping() {
    let b = board(AppConfig::default()).await;

    let response = b
        .app()
        .oneshot(Request::builder().method("POST").uri("/activity").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

// --- Admin Routes ---

#[tokio::test]
async fn test_login_unavailable_without_store() {
    let b = board(AppConfig::default()).await;
    let login = LoginRequest {
        id: "alice".to_string(),
        password: "correct".to_string(),
    };

    let response = b.app().oneshot(post_json("/admin/login", &login)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let b = live_board().await;
    let login = LoginRequest {
        id: "alice".to_string(),
        password: "nope".to_string(),
    };

    let response = b.app().oneshot(post_json("/admin/login", &login)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        b.renderer.last_message(),
        Some(("Wrong password".to_string(), true))
    );
}

#[tokio::test(start_paused = true)]
async fn test_admin_action_after_idle_refreshes() {
    let b = live_board().await;
    let datasets = b.renderer.datasets();
    let fetches = b.store.fetches();

    let idle = b.state.board.config.scheduler.inactivity_threshold + Duration::from_secs(1);
    tokio::time::advance(idle).await;
    sign_in(&b).await;

    assert_eq!(b.renderer.datasets(), datasets + 1);
    assert!(b.store.fetches() > fetches);
}

#[tokio::test]
async fn test_login_then_session_then_logout() {
    let b = live_board().await;
    sign_in(&b).await;

    let session: SessionView = read_json(b.app().oneshot(get("/session")).await.unwrap()).await;
    assert!(session.signed_in);
    assert_eq!(session.admin_id.as_deref(), Some("alice"));

    let response = b
        .app()
        .oneshot(Request::builder().method("POST").uri("/admin/logout").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let session: SessionView = read_json(response).await;
    assert!(!session.signed_in);
}

#[tokio::test]
async fn test_create_requires_sign_in() {
    let b = live_board().await;
    let payload = NewAnnouncementRequest {
        title: "Unauthorized".to_string(),
        ..Default::default()
    };

    let response = b
        .app()
        .oneshot(post_json("/admin/announcements", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_announcement_publishes() {
    let b = live_board().await;
    sign_in(&b).await;
    let payload = NewAnnouncementRequest {
        title: "Room change".to_string(),
        date: Some("2024-09-01".to_string()),
        body: "Moved to B12".to_string(),
        pinned: false,
    };

    let response = b
        .app()
        .oneshot(post_json("/admin/announcements", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: AnnouncementRecord = read_json(response).await;

    let dataset = b.state.board.dataset().unwrap();
    assert!(dataset.announcements.iter().any(|a| a.id == created.id));
    assert_eq!(
        b.renderer.last_message(),
        Some(("Announcement published".to_string(), false))
    );
}

#[tokio::test]
async fn test_create_with_empty_title_rejected() {
    let b = live_board().await;
    sign_in(&b).await;
    let payload = NewAnnouncementRequest {
        title: "  ".to_string(),
        ..Default::default()
    };

    let response = b
        .app()
        .oneshot(post_json("/admin/announcements", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_create_resource_store_down() {
    let b = live_board().await;
    sign_in(&b).await;
    b.store.set_failing(true);

    let response = b
        .app()
        .oneshot(post_json(
            "/admin/resources",
            &serde_json::json!({"title": "Guide", "type": "pdf", "link": "", "description": "d"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

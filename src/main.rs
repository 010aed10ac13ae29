use content_board::{
    AppState, Board, BoardParts,
    config::{AppConfig, Env},
    create_router,
    models::UiEvent,
    renderer::{BroadcastRenderer, RendererState},
    rest::{RestClient, RestState},
    session::{FileSessionSlot, RestoreOutcome, SessionSlotState},
    snapshot::{LocalSnapshot, SnapshotState},
    structured::PostgresConnector,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, assembles the board, restores any
/// persisted admin session, starts the refresh loop and serves HTTP.
#[tokio::main]
async fn main() {
    // 1. Configuration (fails fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "content_board=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Board starting in {:?} mode", config.env);
    if let Err(e) = config.store.validate() {
        tracing::warn!("structured store disabled until configured: {}", e);
    }

    // 3. Collaborators
    let renderer = BroadcastRenderer::new(64);
    spawn_event_log(&renderer);

    let snapshot = LocalSnapshot::new(config.data_dir.clone());
    tracing::info!(dir = %snapshot.dir().display(), "local snapshot directory");

    let parts = BoardParts {
        connector: Arc::new(PostgresConnector),
        rest: Arc::new(RestClient::new(config.store.clone())) as RestState,
        snapshot: Arc::new(snapshot) as SnapshotState,
        slot: Arc::new(FileSessionSlot::new(
            config.session_file.clone(),
            config.session_secret.clone(),
        )) as SessionSlotState,
        renderer: Arc::new(renderer) as RendererState,
        config,
    };

    // 4. Board assembly and startup
    let board = Arc::new(Board::assemble(parts).await);
    if let RestoreOutcome::Authorized(authorized) = board.restore_session().await {
        tracing::info!(admin_id = %authorized.admin_id, "resumed admin session");
    }
    board.start();

    // 5. Router and server
    let bind_addr = board.config.bind_addr.clone();
    let app = create_router(AppState::new(board));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
    }
}

/// Mirrors UI events into the log so a headless deployment still shows what
/// the view would have rendered.
fn spawn_event_log(renderer: &BroadcastRenderer) {
    let mut events = renderer.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(UiEvent::DatasetUpdated {
                    announcements,
                    resources,
                }) => tracing::debug!(
                    announcements = announcements.len(),
                    resources = resources.len(),
                    "view updated"
                ),
                Ok(UiEvent::AdminMessage { text, is_error }) => {
                    tracing::debug!(is_error, "admin message: {}", text)
                }
                Ok(UiEvent::SessionStateChanged { signed_in, admin_id }) => {
                    tracing::debug!(signed_in, admin_id = ?admin_id, "session state changed")
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event log lagged")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

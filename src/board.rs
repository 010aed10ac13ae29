use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::error::{AdminActionError, AuthError, BoardError};
use crate::models::{
    AnnouncementRecord, DataSet, NewAnnouncementRequest, NewResourceRequest, ResourceRecord,
    SessionView,
};
use crate::pipeline::DataPipeline;
use crate::renderer::RendererState;
use crate::rest::RestState;
use crate::scheduler::{ActivityTracker, RefreshScheduler, SchedulerState, TickOutcome};
use crate::session::{AdminGate, RestoreOutcome, SessionSlotState};
use crate::snapshot::SnapshotState;
use crate::structured::{StoreConnector, StructuredClient, Subscription};

/// BoardParts
///
/// The swappable collaborators a board is assembled from. Production wiring
/// lives in `main.rs`; tests pass mocks.
pub struct BoardParts {
    pub config: AppConfig,
    pub connector: Arc<dyn StoreConnector>,
    pub rest: RestState,
    pub snapshot: SnapshotState,
    pub slot: SessionSlotState,
    pub renderer: RendererState,
}

/// Board
///
/// The single application-state object. Owns the pipeline (and through it the
/// current dataset), the scheduler, the admin gate and the activity clock, and
/// turns UI events into calls on them. Shared behind an `Arc`.
pub struct Board {
    pub config: AppConfig,
    pub pipeline: Arc<DataPipeline>,
    pub scheduler: Arc<RefreshScheduler>,
    pub gate: Arc<AdminGate>,
    pub activity: Arc<ActivityTracker>,
    renderer: RendererState,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl Board {
    /// assemble
    ///
    /// Loads the credential store from the snapshot (once, never mutated
    /// afterwards) and wires every component around one structured client.
    pub async fn assemble(parts: BoardParts) -> Self {
        let BoardParts {
            config,
            connector,
            rest,
            snapshot,
            slot,
            renderer,
        } = parts;

        let credentials = snapshot.load_admin_credentials().await;
        tracing::info!(admins = credentials.len(), "credential store loaded");
        let credentials = Arc::new(CredentialStore::new(credentials));

        let structured = Arc::new(StructuredClient::new(config.store.clone(), connector));
        let pipeline = Arc::new(DataPipeline::new(
            structured.clone(),
            rest,
            snapshot,
            renderer.clone(),
        ));
        let activity = Arc::new(ActivityTracker::new());
        let scheduler = Arc::new(RefreshScheduler::new(
            pipeline.clone(),
            activity.clone(),
            config.scheduler.clone(),
        ));
        let gate = Arc::new(AdminGate::new(credentials, structured, slot, renderer.clone()));

        Self {
            config,
            pipeline,
            scheduler,
            gate,
            activity,
            renderer,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// start
    ///
    /// Starts the refresh loop and, once the scheduler first reaches Live,
    /// subscribes to both collections. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let handle = self.scheduler.start()?;

        let board = Arc::clone(self);
        let mut state = self.scheduler.watch_state();
        tokio::spawn(async move {
            if state.wait_for(|s| *s == SchedulerState::Live).await.is_ok() {
                board.follow_changes();
            }
        });

        Some(handle)
    }

    fn follow_changes(&self) {
        let Ok(mut subscriptions) = self.subscriptions.lock() else {
            return;
        };
        if !subscriptions.is_empty() {
            return;
        }
        match self.pipeline.follow_changes() {
            Ok(subs) => {
                tracing::info!(count = subs.len(), "following collection changes");
                *subscriptions = subs;
            }
            Err(e) => tracing::warn!("change subscription unavailable: {}", e),
        }
    }

    pub fn dataset(&self) -> Option<DataSet> {
        self.pipeline.current()
    }

    pub fn session(&self) -> SessionView {
        self.gate.view()
    }

    /// Restores a persisted admin session at startup.
    pub async fn restore_session(&self) -> RestoreOutcome {
        self.gate.restore_from_slot().await
    }

    // --- UI events ---

    pub async fn interaction_ping(&self) -> Option<TickOutcome> {
        self.scheduler.record_interaction().await
    }

    pub async fn submit_login(&self, id: &str, password: &str) -> Result<SessionView, AuthError> {
        self.scheduler.record_interaction().await;
        match self.gate.login(id, password).await {
            Ok(authorized) => {
                self.renderer
                    .admin_message(&format!("Signed in as {}", authorized.admin_id), false);
                Ok(self.session())
            }
            Err(e) => {
                self.renderer.admin_message(&e.to_string(), true);
                Err(e)
            }
        }
    }

    pub async fn submit_logout(&self) -> SessionView {
        self.scheduler.record_interaction().await;
        self.gate.logout().await;
        self.renderer.admin_message("Signed out", false);
        self.session()
    }

    /// submit_create_announcement
    ///
    /// Requires a signed-in admin, then writes through the pipeline (which
    /// refreshes on success). The outcome is reported as an admin message.
    pub async fn submit_create_announcement(
        &self,
        req: NewAnnouncementRequest,
    ) -> Result<AnnouncementRecord, AdminActionError> {
        self.scheduler.record_interaction().await;
        let result = self.create_announcement(req).await;
        self.report(&result, "Announcement published");
        result
    }

    async fn create_announcement(
        &self,
        req: NewAnnouncementRequest,
    ) -> Result<AnnouncementRecord, AdminActionError> {
        let authorized = self.gate.authorize_create()?;
        require_title(&req.title)?;
        tracing::info!(admin_id = %authorized.admin_id, "publishing announcement");
        Ok(self.pipeline.create_announcement(req).await?)
    }

    pub async fn submit_create_resource(
        &self,
        req: NewResourceRequest,
    ) -> Result<ResourceRecord, AdminActionError> {
        self.scheduler.record_interaction().await;
        let result = self.create_resource(req).await;
        self.report(&result, "Resource published");
        result
    }

    async fn create_resource(&self, req: NewResourceRequest) -> Result<ResourceRecord, AdminActionError> {
        let authorized = self.gate.authorize_create()?;
        require_title(&req.title)?;
        tracing::info!(admin_id = %authorized.admin_id, "publishing resource");
        Ok(self.pipeline.create_resource(req).await?)
    }

    fn report<T>(&self, result: &Result<T, AdminActionError>, success: &str) {
        match result {
            Ok(_) => self.renderer.admin_message(success, false),
            Err(e) => {
                tracing::warn!("admin action failed: {}", e);
                self.renderer.admin_message(&e.to_string(), true);
            }
        }
    }
}

fn require_title(title: &str) -> Result<(), BoardError> {
    if title.trim().is_empty() {
        return Err(BoardError::DecodeFailure("title is required".to_string()));
    }
    Ok(())
}

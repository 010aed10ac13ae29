use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::config::SchedulerConfig;
use crate::error::BoardError;
use crate::models::DataSource;
use crate::pipeline::DataPipeline;

/// ActivityTracker
///
/// Time of the last tracked user interaction (click, keypress, ping).
#[derive(Debug)]
pub struct ActivityTracker {
    last: Mutex<Instant>,
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }

    /// Records an interaction now and returns how long the user had been idle before it.
    pub fn touch(&self) -> Duration {
        let now = Instant::now();
        match self.last.lock() {
            Ok(mut last) => {
                let idle = now.saturating_duration_since(*last);
                *last = now;
                idle
            }
            Err(_) => Duration::ZERO,
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.last
            .lock()
            .map(|last| Instant::now().saturating_duration_since(*last))
            .unwrap_or_default()
    }
}

/// SchedulerState
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Nothing attempted yet.
    Bootstrapping,
    /// Structured store reachable; periodic refresh active.
    Live,
    /// Initialization or structured fetch failed; periodic re-attempts active.
    Retrying,
}

/// TickOutcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The pipeline ran; carries the layer that satisfied it.
    Refreshed(DataSource),
    /// Initialization attempt failed; the pipeline still ran and published fallback data.
    Degraded(DataSource),
    /// Non-forced tick while the user was idle. No network call was made.
    SkippedIdle,
}

/// RefreshScheduler
///
/// Drives the pipeline from a single loop. The first tick is forced so initial
/// content always appears; later ticks are gated on recent activity. The loop
/// sleeps `retry_interval` while Retrying and `refresh_interval` while Live.
pub struct RefreshScheduler {
    pipeline: Arc<DataPipeline>,
    activity: Arc<ActivityTracker>,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
    running: AtomicBool,
    tick_lock: tokio::sync::Mutex<()>,
}

impl RefreshScheduler {
    pub fn new(
        pipeline: Arc<DataPipeline>,
        activity: Arc<ActivityTracker>,
        config: SchedulerConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Bootstrapping);
        Self {
            pipeline,
            activity,
            config,
            state,
            running: AtomicBool::new(false),
            tick_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn transition(&self, next: SchedulerState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::info!(from = ?*state, to = ?next, "scheduler state change");
            *state = next;
            true
        });
    }

    /// start
    ///
    /// Spawns the scheduler loop. Only one loop may exist; a second call is a
    /// no-op that returns `None` and leaves the running loop untouched.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("refresh loader already running, ignoring start");
            return None;
        }

        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move { scheduler.run().await }))
    }

    async fn run(&self) {
        self.tick(true).await;
        loop {
            let period = match self.state() {
                SchedulerState::Live => self.config.refresh_interval,
                SchedulerState::Bootstrapping | SchedulerState::Retrying => self.config.retry_interval,
            };
            tokio::time::sleep(period).await;
            self.tick(false).await;
        }
    }

    /// tick
    ///
    /// One scheduler step. Non-forced ticks are skipped when the user has been
    /// idle longer than the inactivity threshold. Ticks never overlap.
    pub async fn tick(&self, forced: bool) -> TickOutcome {
        let _guard = self.tick_lock.lock().await;

        if !forced {
            let idle = self.activity.idle_for();
            if idle > self.config.inactivity_threshold {
                tracing::info!(idle_secs = idle.as_secs(), "refresh skipped: user inactive");
                return TickOutcome::SkippedIdle;
            }
        }

        match self.state() {
            SchedulerState::Live => TickOutcome::Refreshed(self.pipeline.refresh().await.source),
            SchedulerState::Bootstrapping | SchedulerState::Retrying => self.attempt().await,
        }
    }

    /// Initializes the structured client (if needed) and refreshes. Live only
    /// when the refresh was actually served by the structured store.
    async fn attempt(&self) -> TickOutcome {
        let init = self.pipeline.structured().initialize().await;
        match &init {
            Ok(_) => {}
            Err(BoardError::ConfigInvalid(reason)) => {
                tracing::debug!("structured store not configured: {}", reason)
            }
            Err(e) => tracing::warn!("structured store initialization failed: {}", e),
        }

        let dataset = self.pipeline.refresh().await;
        if init.is_ok() && dataset.source == DataSource::Structured {
            self.transition(SchedulerState::Live);
            TickOutcome::Refreshed(dataset.source)
        } else {
            self.transition(SchedulerState::Retrying);
            TickOutcome::Degraded(dataset.source)
        }
    }

    /// record_interaction
    ///
    /// Marks user activity. When the user returns after more than the inactivity
    /// threshold, the content may be stale, so one forced tick runs immediately.
    pub async fn record_interaction(&self) -> Option<TickOutcome> {
        let idle = self.activity.touch();
        if idle > self.config.inactivity_threshold {
            tracing::info!(idle_secs = idle.as_secs(), "user returned after inactivity, forcing refresh");
            return Some(self.tick(true).await);
        }
        None
    }
}

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::models::{DataSet, UiEvent};

/// Renderer
///
/// The view layer as seen from the core. It receives copies of published data
/// and never hands anything back.
pub trait Renderer: Send + Sync {
    fn dataset_updated(&self, dataset: &DataSet);

    fn admin_message(&self, text: &str, is_error: bool);

    fn session_state_changed(&self, signed_in: bool, admin_id: Option<&str>);
}

pub type RendererState = Arc<dyn Renderer>;

fn dataset_event(dataset: &DataSet) -> UiEvent {
    UiEvent::DatasetUpdated {
        announcements: dataset.announcements.clone(),
        resources: dataset.resources.clone(),
    }
}

/// BroadcastRenderer
///
/// Fans every UI event out to all current receivers. Sending with no receivers is not an error.
#[derive(Clone)]
pub struct BroadcastRenderer {
    tx: broadcast::Sender<UiEvent>,
}

impl BroadcastRenderer {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    fn send(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }
}

impl Renderer for BroadcastRenderer {
    fn dataset_updated(&self, dataset: &DataSet) {
        self.send(dataset_event(dataset));
    }

    fn admin_message(&self, text: &str, is_error: bool) {
        self.send(UiEvent::AdminMessage {
            text: text.to_string(),
            is_error,
        });
    }

    fn session_state_changed(&self, signed_in: bool, admin_id: Option<&str>) {
        self.send(UiEvent::SessionStateChanged {
            signed_in,
            admin_id: admin_id.map(str::to_string),
        });
    }
}

/// RecordingRenderer
///
/// Keeps every event in order, for assertions in tests.
#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn datasets(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, UiEvent::DatasetUpdated { .. }))
            .count()
    }

    /// The most recent admin message and its error flag.
    pub fn last_message(&self) -> Option<(String, bool)> {
        self.events().into_iter().rev().find_map(|e| match e {
            UiEvent::AdminMessage { text, is_error } => Some((text, is_error)),
            _ => None,
        })
    }

    fn push(&self, event: UiEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Renderer for RecordingRenderer {
    fn dataset_updated(&self, dataset: &DataSet) {
        self.push(dataset_event(dataset));
    }

    fn admin_message(&self, text: &str, is_error: bool) {
        self.push(UiEvent::AdminMessage {
            text: text.to_string(),
            is_error,
        });
    }

    fn session_state_changed(&self, signed_in: bool, admin_id: Option<&str>) {
        self.push(UiEvent::SessionStateChanged {
            signed_in,
            admin_id: admin_id.map(str::to_string),
        });
    }
}

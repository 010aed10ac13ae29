#![allow(dead_code)]

use content_board::config::StoreConfig;
use content_board::models::{AnnouncementRecord, ResourceRecord};
use content_board::pipeline::DataPipeline;
use content_board::renderer::{RecordingRenderer, RendererState};
use content_board::rest::{MockRestSource, RestState};
use content_board::snapshot::{MockSnapshot, SnapshotState};
use content_board::structured::{MockConnector, MockStore, StructuredClient};
use std::sync::Arc;

/// Descriptor that passes validation.
pub fn live_config() -> StoreConfig {
    StoreConfig {
        api_key: Some("test-key".to_string()),
        project_id: Some("board".to_string()),
        ..Default::default()
    }
}

pub fn announcement(id: &str, pinned: bool, date: &str) -> AnnouncementRecord {
    AnnouncementRecord {
        id: id.to_string(),
        title: format!("Announcement {id}"),
        body: "body".to_string(),
        date: Some(date.to_string()),
        pinned,
    }
    .normalized()
}

pub fn resource(id: &str) -> ResourceRecord {
    ResourceRecord {
        id: id.to_string(),
        title: format!("Resource {id}"),
        kind: "link".to_string(),
        description: "desc".to_string(),
        link: format!("https://example.org/{id}"),
    }
}

/// A pipeline over mocks, with handles on every mock for assertions.
pub struct PipelineHarness {
    pub store: Arc<MockStore>,
    pub connector: Arc<MockConnector>,
    pub rest: Arc<MockRestSource>,
    pub snapshot: Arc<MockSnapshot>,
    pub renderer: Arc<RecordingRenderer>,
    pub pipeline: Arc<DataPipeline>,
}

impl PipelineHarness {
    pub fn new(config: StoreConfig, rest: MockRestSource) -> Self {
        let store = Arc::new(MockStore::new(
            vec![announcement("remote", false, "2024-05-01")],
            vec![resource("remote-r")],
        ));
        let connector = Arc::new(MockConnector::new(store.clone()));
        let rest = Arc::new(rest);
        let snapshot = Arc::new(MockSnapshot::new(
            vec![announcement("local", false, "2020-01-01")],
            vec![resource("local-r")],
        ));
        let renderer = Arc::new(RecordingRenderer::new());

        let structured = Arc::new(StructuredClient::new(config, connector.clone()));
        let pipeline = Arc::new(DataPipeline::new(
            structured,
            rest.clone() as RestState,
            snapshot.clone() as SnapshotState,
            renderer.clone() as RendererState,
        ));

        Self {
            store,
            connector,
            rest,
            snapshot,
            renderer,
            pipeline,
        }
    }

    /// Valid config, REST and local layers available.
    pub fn live() -> Self {
        Self::new(
            live_config(),
            MockRestSource::new(vec![announcement("rest", false, "2023-01-01")], vec![]),
        )
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::BoardError;
use crate::models::{
    AnnouncementRecord, DataSet, DataSource, NewAnnouncementRequest, NewResourceRequest, RecordKind,
    ResourceRecord, sort_announcements,
};
use crate::renderer::RendererState;
use crate::rest::RestState;
use crate::snapshot::SnapshotState;
use crate::structured::{CollectionSnapshot, StructuredClient, Subscription};

/// DataPipeline
///
/// The fallback orchestrator. Owns the most recently published dataset and is
/// the only component that writes it.
///
/// Acquisition order on every refresh:
/// 1. structured store (only when a live handle exists),
/// 2. REST endpoint,
/// 3. local snapshot, which cannot fail.
///
/// Every publication takes a revision from a monotonic counter; a result whose
/// revision is older than the published one is dropped, so a slow refresh can
/// never overwrite a newer dataset.
pub struct DataPipeline {
    structured: Arc<StructuredClient>,
    rest: RestState,
    snapshot: SnapshotState,
    renderer: RendererState,
    current: RwLock<Option<DataSet>>,
    next_revision: AtomicU64,
}

impl DataPipeline {
    pub fn new(
        structured: Arc<StructuredClient>,
        rest: RestState,
        snapshot: SnapshotState,
        renderer: RendererState,
    ) -> Self {
        Self {
            structured,
            rest,
            snapshot,
            renderer,
            current: RwLock::new(None),
            next_revision: AtomicU64::new(0),
        }
    }

    pub fn structured(&self) -> &Arc<StructuredClient> {
        &self.structured
    }

    /// The most recently published dataset, if any refresh has completed.
    pub fn current(&self) -> Option<DataSet> {
        self.current.read().ok().and_then(|guard| guard.clone())
    }

    fn take_revision(&self) -> u64 {
        self.next_revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// refresh
    ///
    /// Runs the fallback chain once, sorts announcements and publishes the pair.
    /// Never fails: the worst outcome is an empty local dataset.
    pub async fn refresh(&self) -> DataSet {
        let revision = self.take_revision();
        let (mut announcements, resources, source) = self.acquire().await;

        sort_announcements(&mut announcements);
        let dataset = DataSet {
            announcements,
            resources,
            source,
            revision,
        };

        tracing::info!(
            source = ?dataset.source,
            revision,
            announcements = dataset.announcements.len(),
            resources = dataset.resources.len(),
            "dataset refreshed"
        );
        self.publish(dataset.clone());
        dataset
    }

    async fn acquire(&self) -> (Vec<AnnouncementRecord>, Vec<ResourceRecord>, DataSource) {
        if self.structured.is_live() {
            match self.structured.fetch_all().await {
                Ok((announcements, resources)) => {
                    return (announcements, resources, DataSource::Structured);
                }
                Err(e) => tracing::warn!("structured fetch failed, trying REST: {}", e),
            }
        }

        if let Some((announcements, resources)) = self.rest.fetch_all().await {
            return (announcements, resources, DataSource::Rest);
        }

        tracing::info!("remote sources unavailable, loading local snapshot");
        let (announcements, resources) = tokio::join!(
            self.snapshot.load_announcements(),
            self.snapshot.load_resources()
        );
        (announcements, resources, DataSource::Local)
    }

    /// Stores and renders `dataset` unless a newer revision is already published.
    fn publish(&self, dataset: DataSet) -> bool {
        let Ok(mut current) = self.current.write() else {
            return false;
        };
        self.publish_locked(&mut current, dataset)
    }

    fn publish_locked(&self, current: &mut Option<DataSet>, dataset: DataSet) -> bool {
        if let Some(published) = current.as_ref() {
            if published.revision > dataset.revision {
                tracing::debug!(
                    stale = dataset.revision,
                    published = published.revision,
                    "discarding out-of-order dataset"
                );
                return false;
            }
        }

        // Rendered under the lock so the renderer observes publications in revision order.
        self.renderer.dataset_updated(&dataset);
        *current = Some(dataset);
        true
    }

    /// create_announcement
    ///
    /// Writes through the structured store, then refreshes once so the new item
    /// shows up. Without a live handle this fails with `NotInitialized` and does
    /// not refresh.
    pub async fn create_announcement(
        &self,
        req: NewAnnouncementRequest,
    ) -> Result<AnnouncementRecord, BoardError> {
        if !self.structured.is_live() {
            return Err(BoardError::NotInitialized);
        }
        let record = self.structured.create_announcement(req).await?;
        tracing::info!(id = %record.id, "announcement created");
        self.refresh().await;
        Ok(record)
    }

    pub async fn create_resource(&self, req: NewResourceRequest) -> Result<ResourceRecord, BoardError> {
        if !self.structured.is_live() {
            return Err(BoardError::NotInitialized);
        }
        let record = self.structured.create_resource(req).await?;
        tracing::info!(id = %record.id, "resource created");
        self.refresh().await;
        Ok(record)
    }

    /// follow_changes
    ///
    /// Subscribes to both collections. Each change replaces that half of the
    /// published dataset and republishes it under a fresh revision.
    pub fn follow_changes(self: &Arc<Self>) -> Result<Vec<Subscription>, BoardError> {
        let mut subscriptions = Vec::with_capacity(2);

        for kind in [RecordKind::Announcements, RecordKind::Resources] {
            let pipeline = Arc::clone(self);
            let on_change = Arc::new(move |snapshot: CollectionSnapshot| pipeline.apply_change(snapshot));
            let on_error = Arc::new(move |e: BoardError| {
                tracing::warn!(collection = kind.collection(), "change listener error: {}", e);
            });
            subscriptions.push(self.structured.subscribe(kind, on_change, on_error)?);
        }

        Ok(subscriptions)
    }

    /// Merges one collection's full content into the published dataset.
    ///
    /// Read, merge and publish happen under one write guard, so concurrent
    /// changes to the two collections cannot drop each other's half.
    pub fn apply_change(&self, snapshot: CollectionSnapshot) {
        let Ok(mut current) = self.current.write() else {
            return;
        };

        let revision = self.take_revision();
        let mut dataset = current.clone().unwrap_or(DataSet {
            announcements: vec![],
            resources: vec![],
            source: DataSource::Structured,
            revision,
        });

        match snapshot {
            CollectionSnapshot::Announcements(mut announcements) => {
                sort_announcements(&mut announcements);
                dataset.announcements = announcements;
            }
            CollectionSnapshot::Resources(resources) => dataset.resources = resources,
        }
        dataset.source = DataSource::Structured;
        dataset.revision = revision;

        tracing::debug!(revision, "applying change notification");
        self.publish_locked(&mut current, dataset);
    }
}

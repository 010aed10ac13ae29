use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::credentials::resolve_entry;
use crate::models::{AdminCredential, AnnouncementRecord, CredentialEntry, RecordKind, ResourceRecord};

/// File holding the admin credential list inside the snapshot directory.
pub const CREDENTIALS_FILE: &str = "admins.json";

// 1. SnapshotSource Contract
/// SnapshotSource
///
/// Read-only local copy of the board's data, used as the last-resort fallback
/// and as the only source of admin credentials. Every method fails soft: a
/// missing or malformed source yields an empty result and a log line.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn load_announcements(&self) -> Vec<AnnouncementRecord>;

    async fn load_resources(&self) -> Vec<ResourceRecord>;

    async fn load_admin_credentials(&self) -> HashMap<String, AdminCredential>;
}

pub type SnapshotState = Arc<dyn SnapshotSource>;

// 2. The Real Implementation (JSON files on disk)
/// LocalSnapshot
///
/// Reads `announcements.json`, `resources.json` and `admins.json` from a directory.
/// Each file is a JSON array of plain records.
#[derive(Clone, Debug)]
pub struct LocalSnapshot {
    dir: PathBuf,
}

impl LocalSnapshot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_list<T: DeserializeOwned>(&self, file: &str) -> Vec<T> {
        let path = self.dir.join(file);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(path = %path.display(), "snapshot read failed: {}", e);
                return vec![];
            }
        };

        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(path = %path.display(), "snapshot decode failed: {}", e);
                vec![]
            }
        }
    }

    async fn read_records<T: DeserializeOwned>(&self, kind: RecordKind) -> Vec<T> {
        self.read_list(&format!("{}.json", kind.collection())).await
    }
}

/// Snapshot files may omit ids; positional ids keep them unique within the source.
fn local_id(kind: RecordKind, index: usize) -> String {
    format!("local-{}-{}", kind.collection(), index)
}

#[async_trait]
impl SnapshotSource for LocalSnapshot {
    async fn load_announcements(&self) -> Vec<AnnouncementRecord> {
        self.read_records::<AnnouncementRecord>(RecordKind::Announcements)
            .await
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                if record.id.is_empty() {
                    record.id = local_id(RecordKind::Announcements, i);
                }
                record.normalized()
            })
            .collect()
    }

    async fn load_resources(&self) -> Vec<ResourceRecord> {
        self.read_records::<ResourceRecord>(RecordKind::Resources)
            .await
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                if record.id.is_empty() {
                    record.id = local_id(RecordKind::Resources, i);
                }
                record.normalized()
            })
            .collect()
    }

    async fn load_admin_credentials(&self) -> HashMap<String, AdminCredential> {
        let entries = self.read_list::<CredentialEntry>(CREDENTIALS_FILE).await;
        let total = entries.len();

        let mut credentials = HashMap::new();
        for credential in entries.into_iter().filter_map(resolve_entry) {
            // First entry for an id wins; credentials are immutable once loaded.
            credentials.entry(credential.id.clone()).or_insert(credential);
        }

        if credentials.len() != total {
            tracing::warn!(
                loaded = credentials.len(),
                skipped = total - credentials.len(),
                "some admin credential entries were unusable"
            );
        }
        credentials
    }
}

// 3. The Mock Implementation (For Tests)
/// MockSnapshot
///
/// Canned snapshot content plus a counter of record-set loads, so tests can
/// assert whether the pipeline ever fell through to the local layer.
#[derive(Default)]
pub struct MockSnapshot {
    pub announcements: Vec<AnnouncementRecord>,
    pub resources: Vec<ResourceRecord>,
    pub credentials: Vec<AdminCredential>,
    loads: AtomicUsize,
}

impl MockSnapshot {
    pub fn new(announcements: Vec<AnnouncementRecord>, resources: Vec<ResourceRecord>) -> Self {
        Self {
            announcements,
            resources,
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, credentials: Vec<AdminCredential>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Number of announcement/resource loads served so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for MockSnapshot {
    async fn load_announcements(&self) -> Vec<AnnouncementRecord> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.announcements.clone()
    }

    async fn load_resources(&self) -> Vec<ResourceRecord> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.resources.clone()
    }

    async fn load_admin_credentials(&self) -> HashMap<String, AdminCredential> {
        let mut credentials = HashMap::new();
        for credential in &self.credentials {
            credentials
                .entry(credential.id.clone())
                .or_insert_with(|| credential.clone());
        }
        credentials
    }
}

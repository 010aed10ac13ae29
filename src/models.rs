use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Collections ---

/// RecordKind
///
/// The two named collections the board reads. The same names are used for the
/// structured store tables, the REST endpoints and the local snapshot files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Announcements,
    Resources,
}

impl RecordKind {
    pub fn collection(self) -> &'static str {
        match self {
            RecordKind::Announcements => "announcements",
            RecordKind::Resources => "resources",
        }
    }
}

// --- Canonical Records ---

/// AnnouncementRecord
///
/// Store-agnostic announcement. `date` is always held in the canonical form
/// produced by [`canonical_date`] once the record has left its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AnnouncementRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub pinned: bool,
}

impl AnnouncementRecord {
    /// Rewrites `date` into the canonical form; blank dates become absent.
    pub fn normalized(mut self) -> Self {
        self.date = self
            .date
            .filter(|d| !d.trim().is_empty())
            .map(|d| canonical_date(&d));
        self
    }
}

/// ResourceRecord
///
/// A categorised link. `type` is a reserved keyword in Rust, so it is held as `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResourceRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_link")]
    pub link: String,
}

impl Default for ResourceRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            kind: String::new(),
            description: String::new(),
            link: default_link(),
        }
    }
}

impl ResourceRecord {
    /// Blank links fall back to `#`.
    pub fn normalized(mut self) -> Self {
        if self.link.trim().is_empty() {
            self.link = default_link();
        }
        self
    }
}

fn default_link() -> String {
    "#".to_string()
}

/// AdminCredential
///
/// One admin identity. The hash is a lowercase SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredential {
    pub id: String,
    pub password_hash: String,
}

/// CredentialEntry
///
/// Raw credential list entry as stored in the local snapshot. Either field may
/// carry the secret; a plaintext `password` is hashed on load.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEntry {
    pub id: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

// --- Published Dataset ---

/// DataSource
///
/// Which acquisition layer satisfied a refresh. Observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DataSource {
    Structured,
    Rest,
    Local,
}

/// DataSet
///
/// The announcement/resource pair handed to the renderer. `revision` increases
/// with every publication so stale results can be recognised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DataSet {
    pub announcements: Vec<AnnouncementRecord>,
    pub resources: Vec<ResourceRecord>,
    pub source: DataSource,
    #[ts(type = "number")]
    pub revision: u64,
}

// --- Request Payloads ---

/// NewAnnouncementRequest
///
/// Admin panel payload for publishing an announcement. The id is assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewAnnouncementRequest {
    pub title: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub pinned: bool,
}

/// NewResourceRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewResourceRequest {
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
}

/// LoginRequest
///
/// The password only passes through to the digest and is never stored or logged.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub id: String,
    pub password: String,
}

// --- Session & UI Events ---

/// SessionView
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionView {
    pub signed_in: bool,
    pub admin_id: Option<String>,
}

/// UiEvent
///
/// Everything the core emits towards the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "camelCase")]
#[ts(export)]
pub enum UiEvent {
    #[serde(rename_all = "camelCase")]
    DatasetUpdated {
        announcements: Vec<AnnouncementRecord>,
        resources: Vec<ResourceRecord>,
    },
    #[serde(rename_all = "camelCase")]
    AdminMessage { text: String, is_error: bool },
    #[serde(rename_all = "camelCase")]
    SessionStateChanged {
        signed_in: bool,
        admin_id: Option<String>,
    },
}

// --- Dates ---

/// Parses RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical string form of a point in time, e.g. `2024-05-01T09:30:00.000Z`.
pub fn canonical_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Canonical form of a textual date. Unparseable input is returned verbatim.
pub fn canonical_date(raw: &str) -> String {
    parse_date(raw)
        .map(canonical_timestamp)
        .unwrap_or_else(|| raw.to_string())
}

// --- Ordering & Filtering ---

/// sort_announcements
///
/// Pinned records first, then most recent date first. The sort is stable, so
/// equal keys keep source order. Missing or unparseable dates trail their group.
pub fn sort_announcements(items: &mut [AnnouncementRecord]) {
    items.sort_by(|a, b| {
        b.pinned.cmp(&a.pinned).then_with(|| {
            let a_date = a.date.as_deref().and_then(parse_date);
            let b_date = b.date.as_deref().and_then(parse_date);
            b_date.cmp(&a_date)
        })
    });
}

/// Case-insensitive substring match over title and body.
pub fn filter_announcements(items: &[AnnouncementRecord], query: &str) -> Vec<AnnouncementRecord> {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .filter(|a| format!("{}{}", a.title, a.body).to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Case-insensitive substring match over title, description and type.
pub fn filter_resources(items: &[ResourceRecord], query: &str) -> Vec<ResourceRecord> {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .filter(|r| {
            format!("{}{}{}", r.title, r.description, r.kind)
                .to_lowercase()
                .contains(&needle)
        })
        .cloned()
        .collect()
}

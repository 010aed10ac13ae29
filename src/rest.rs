use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::StoreConfig;
use crate::models::{AnnouncementRecord, RecordKind, ResourceRecord, canonical_date};

/// Document endpoint used when the descriptor carries no `restBaseUrl`.
const DEFAULT_REST_BASE: &str = "https://firestore.googleapis.com/v1/projects";

/// Upper bound on followed `nextPageToken`s per collection.
const MAX_PAGES: usize = 50;

// 1. RestSource Contract
/// RestSource
///
/// Secondary, read-only acquisition layer. `None` means the layer could not
/// produce a complete pair; no partial result is ever returned.
#[async_trait]
pub trait RestSource: Send + Sync {
    async fn fetch_all(&self) -> Option<(Vec<AnnouncementRecord>, Vec<ResourceRecord>)>;
}

pub type RestState = Arc<dyn RestSource>;

// --- Wire Format ---

/// ListDocumentsResponse
///
/// `GET {base}/{collection}` body. An empty collection omits `documents` entirely.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<RestDocument>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// RestDocument
///
/// `name` is the full resource path; its last segment is the document id.
/// Every entry of `fields` is a typed envelope such as `{"stringValue": "x"}`.
#[derive(Debug, Default, Deserialize)]
pub struct RestDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RestDocument {
    pub fn id(&self) -> String {
        self.name.rsplit('/').next().unwrap_or_default().to_string()
    }

    fn field(&self, key: &str) -> Value {
        self.fields.get(key).map(decode_value).unwrap_or(Value::Null)
    }

    fn string_field(&self, key: &str) -> String {
        match self.field(key) {
            Value::String(s) => s,
            _ => String::new(),
        }
    }
}

/// decode_value
///
/// Unwraps one typed envelope. Arrays are unwrapped one level deep: their
/// elements are decoded as scalars and a nested array decodes to null.
/// Unknown or empty envelopes decode to null; decoding never fails.
pub fn decode_value(envelope: &Value) -> Value {
    if let Some(values) = envelope
        .get("arrayValue")
        .map(|array| array.get("values").and_then(Value::as_array))
    {
        return Value::Array(values.map(|v| v.iter().map(decode_scalar).collect()).unwrap_or_default());
    }
    decode_scalar(envelope)
}

fn decode_scalar(envelope: &Value) -> Value {
    let Some(object) = envelope.as_object() else {
        return Value::Null;
    };

    if let Some(Value::String(s)) = object.get("stringValue") {
        return Value::String(s.clone());
    }
    if let Some(Value::String(ts)) = object.get("timestampValue") {
        return Value::String(canonical_date(ts));
    }
    if let Some(Value::Bool(b)) = object.get("booleanValue") {
        return Value::Bool(*b);
    }
    if let Some(raw) = object.get("integerValue") {
        // 64-bit integers travel as strings.
        let parsed = match raw {
            Value::String(s) => s.parse::<i64>().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        return parsed.map(|i| Value::Number(i.into())).unwrap_or(Value::Null);
    }
    if let Some(raw) = object.get("doubleValue") {
        return raw
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    Value::Null
}

/// Converts a REST document into the canonical announcement shape.
pub fn decode_announcement(doc: &RestDocument) -> AnnouncementRecord {
    let date = match doc.field("date") {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    };

    AnnouncementRecord {
        id: doc.id(),
        title: doc.string_field("title"),
        body: doc.string_field("body"),
        date,
        pinned: doc.field("pinned").as_bool().unwrap_or(false),
    }
    .normalized()
}

/// Converts a REST document into the canonical resource shape.
pub fn decode_resource(doc: &RestDocument) -> ResourceRecord {
    ResourceRecord {
        id: doc.id(),
        title: doc.string_field("title"),
        kind: doc.string_field("type"),
        description: doc.string_field("description"),
        link: doc.string_field("link"),
    }
    .normalized()
}

// 2. The Real Implementation (HTTP)
/// RestClient
///
/// Plain HTTP access to the store's public document endpoint. Only attempted
/// when the descriptor supplies both an access key and a store identifier.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    config: StoreConfig,
}

impl RestClient {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn base_url(&self, project_id: &str) -> String {
        match self.config.rest_base_url.as_deref() {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("{DEFAULT_REST_BASE}/{project_id}/databases/(default)/documents"),
        }
    }

    /// Reads every page of one collection. Any non-success status fails the collection.
    async fn fetch_documents(
        &self,
        base: &str,
        key: &str,
        kind: RecordKind,
    ) -> Option<Vec<RestDocument>> {
        let url = format!("{}/{}", base, kind.collection());
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self.http.get(&url).query(&[("key", key)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(collection = kind.collection(), "REST request failed: {}", e);
                    return None;
                }
            };

            if !response.status().is_success() {
                tracing::warn!(
                    collection = kind.collection(),
                    status = %response.status(),
                    "REST request rejected"
                );
                return None;
            }

            let page = match response.json::<ListDocumentsResponse>().await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(collection = kind.collection(), "REST body malformed: {}", e);
                    return None;
                }
            };

            documents.extend(page.documents);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Some(documents),
            }
        }

        tracing::warn!(collection = kind.collection(), "REST pagination limit reached");
        Some(documents)
    }
}

#[async_trait]
impl RestSource for RestClient {
    async fn fetch_all(&self) -> Option<(Vec<AnnouncementRecord>, Vec<ResourceRecord>)> {
        let Some((key, project_id)) = self.config.rest_credentials() else {
            tracing::debug!("REST fallback skipped: access key or store id missing");
            return None;
        };
        let base = self.base_url(project_id);

        let (announcements, resources) = tokio::join!(
            self.fetch_documents(&base, key, RecordKind::Announcements),
            self.fetch_documents(&base, key, RecordKind::Resources),
        );
        let (announcements, resources) = (announcements?, resources?);

        Some((
            announcements.iter().map(decode_announcement).collect(),
            resources.iter().map(decode_resource).collect(),
        ))
    }
}

// 3. The Mock Implementation (For Tests)
/// MockRestSource
///
/// Returns a canned result and counts how often it was consulted.
#[derive(Default)]
pub struct MockRestSource {
    result: Option<(Vec<AnnouncementRecord>, Vec<ResourceRecord>)>,
    calls: AtomicUsize,
}

impl MockRestSource {
    pub fn new(announcements: Vec<AnnouncementRecord>, resources: Vec<ResourceRecord>) -> Self {
        Self {
            result: Some((announcements, resources)),
            calls: AtomicUsize::new(0),
        }
    }

    /// A REST layer that always fails.
    pub fn new_failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RestSource for MockRestSource {
    async fn fetch_all(&self) -> Option<(Vec<AnnouncementRecord>, Vec<ResourceRecord>)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

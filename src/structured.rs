use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::BoardError;
use crate::models::{
    AnnouncementRecord, NewAnnouncementRequest, NewResourceRequest, RecordKind, ResourceRecord,
    canonical_timestamp, parse_date,
};

/// Stream of "collection changed" signals. Errors are transient listener failures.
pub type ChangeFeed = mpsc::Receiver<Result<(), BoardError>>;

/// CollectionSnapshot
///
/// Full current content of one collection, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionSnapshot {
    Announcements(Vec<AnnouncementRecord>),
    Resources(Vec<ResourceRecord>),
}

pub type ChangeHandler = Arc<dyn Fn(CollectionSnapshot) + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(BoardError) + Send + Sync>;

// 1. StructuredStore Contract
/// StructuredStore
///
/// Capabilities the board needs from the remote document store: fetch a whole
/// collection, create a document (the store assigns its id), and signal when a
/// collection changed. Records leave an implementation already normalized.
#[async_trait]
pub trait StructuredStore: Send + Sync {
    async fn fetch_announcements(&self) -> Result<Vec<AnnouncementRecord>, BoardError>;

    async fn fetch_resources(&self) -> Result<Vec<ResourceRecord>, BoardError>;

    async fn create_announcement(
        &self,
        req: NewAnnouncementRequest,
    ) -> Result<AnnouncementRecord, BoardError>;

    async fn create_resource(&self, req: NewResourceRequest) -> Result<ResourceRecord, BoardError>;

    /// Registers interest in a collection. Each `Ok(())` on the feed means the content changed.
    async fn listen(&self, kind: RecordKind) -> Result<ChangeFeed, BoardError>;
}

/// The live connection handle shared by every structured operation.
pub type StoreHandle = Arc<dyn StructuredStore>;

/// StoreConnector
///
/// Produces a handle from a validated descriptor. Separated from the store so the
/// client can create its handle lazily and tests can script connection failures.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &StoreConfig) -> Result<StoreHandle, BoardError>;
}

// 2. StructuredClient
/// StructuredClient
///
/// Owns the lazily created handle. `initialize` is the only way a handle comes
/// into existence; once created it lives for the rest of the process.
pub struct StructuredClient {
    config: StoreConfig,
    connector: Arc<dyn StoreConnector>,
    handle: RwLock<Option<StoreHandle>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl StructuredClient {
    pub fn new(config: StoreConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            config,
            connector,
            handle: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The live handle, if initialization has succeeded.
    pub fn handle(&self) -> Option<StoreHandle> {
        self.handle.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_live(&self) -> bool {
        self.handle().is_some()
    }

    /// initialize
    ///
    /// Returns the existing handle, or validates the descriptor and connects.
    /// A placeholder or missing key fails with `ConfigInvalid` before any network call.
    pub async fn initialize(&self) -> Result<StoreHandle, BoardError> {
        if let Some(handle) = self.handle() {
            return Ok(handle);
        }

        // Concurrent callers wait for the first attempt instead of racing a second connection.
        let _guard = self.init_lock.lock().await;
        if let Some(handle) = self.handle() {
            return Ok(handle);
        }

        self.config.validate()?;

        let handle = self.connector.connect(&self.config).await?;
        if let Ok(mut slot) = self.handle.write() {
            *slot = Some(handle.clone());
        }
        tracing::info!("structured store connection established");
        Ok(handle)
    }

    /// fetch_all
    ///
    /// Reads both collections concurrently and waits for both to settle. Either
    /// failure fails the pair as a whole.
    pub async fn fetch_all(
        &self,
    ) -> Result<(Vec<AnnouncementRecord>, Vec<ResourceRecord>), BoardError> {
        let store = self.handle().ok_or(BoardError::NotInitialized)?;

        let (announcements, resources) =
            tokio::join!(store.fetch_announcements(), store.fetch_resources());

        Ok((announcements?, resources?))
    }

    /// One-shot read of a single collection.
    pub async fn fetch(&self, kind: RecordKind) -> Result<CollectionSnapshot, BoardError> {
        let store = self.handle().ok_or(BoardError::NotInitialized)?;
        fetch_collection(store.as_ref(), kind).await
    }

    pub async fn create_announcement(
        &self,
        req: NewAnnouncementRequest,
    ) -> Result<AnnouncementRecord, BoardError> {
        let store = self.handle().ok_or(BoardError::NotInitialized)?;
        store.create_announcement(req).await
    }

    pub async fn create_resource(&self, req: NewResourceRequest) -> Result<ResourceRecord, BoardError> {
        let store = self.handle().ok_or(BoardError::NotInitialized)?;
        store.create_resource(req).await
    }

    /// subscribe
    ///
    /// Spawns a listener that calls `on_change` with the full collection once on
    /// registration and again after every change. Listener and read failures go
    /// to `on_error`; the subscription keeps running until `unsubscribe`.
    pub fn subscribe(
        &self,
        kind: RecordKind,
        on_change: ChangeHandler,
        on_error: ErrorHandler,
    ) -> Result<Subscription, BoardError> {
        let store = self.handle().ok_or(BoardError::NotInitialized)?;

        let task = tokio::spawn(async move {
            let mut feed = match store.listen(kind).await {
                Ok(feed) => feed,
                Err(e) => {
                    on_error(e);
                    return;
                }
            };

            deliver(store.as_ref(), kind, &on_change, &on_error).await;

            while let Some(event) = feed.recv().await {
                match event {
                    Ok(()) => deliver(store.as_ref(), kind, &on_change, &on_error).await,
                    Err(e) => on_error(e),
                }
            }
            tracing::debug!(collection = kind.collection(), "change feed closed");
        });

        Ok(Subscription { kind, task })
    }
}

async fn fetch_collection(
    store: &dyn StructuredStore,
    kind: RecordKind,
) -> Result<CollectionSnapshot, BoardError> {
    match kind {
        RecordKind::Announcements => store
            .fetch_announcements()
            .await
            .map(CollectionSnapshot::Announcements),
        RecordKind::Resources => store.fetch_resources().await.map(CollectionSnapshot::Resources),
    }
}

async fn deliver(
    store: &dyn StructuredStore,
    kind: RecordKind,
    on_change: &ChangeHandler,
    on_error: &ErrorHandler,
) {
    match fetch_collection(store, kind).await {
        Ok(snapshot) => on_change(snapshot),
        Err(e) => on_error(e),
    }
}

/// Subscription
///
/// Handle to a running change listener.
pub struct Subscription {
    kind: RecordKind,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the listener. No callback fires after this returns to the runtime.
    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

// 3. The Real Implementation (Postgres)
/// PostgresConnector
///
/// Opens a `PgPool` against the descriptor's `databaseUrl`.
pub struct PostgresConnector;

#[async_trait]
impl StoreConnector for PostgresConnector {
    async fn connect(&self, config: &StoreConfig) -> Result<StoreHandle, BoardError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| BoardError::ConfigInvalid("databaseUrl is missing".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(remote)?;

        Ok(Arc::new(PostgresStore::new(pool)))
    }
}

/// PostgresStore
///
/// Collections map to the `announcements` and `resources` tables. Triggers
/// raise `NOTIFY <collection>_changed` on every write, see the migrations.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AnnouncementRow {
    id: Uuid,
    title: String,
    body: String,
    date: Option<DateTime<Utc>>,
    pinned: bool,
}

impl From<AnnouncementRow> for AnnouncementRecord {
    fn from(row: AnnouncementRow) -> Self {
        AnnouncementRecord {
            id: row.id.to_string(),
            title: row.title,
            body: row.body,
            // Store-native timestamp → canonical string before the record leaves the client.
            date: row.date.map(canonical_timestamp),
            pinned: row.pinned,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: Uuid,
    title: String,
    kind: String,
    description: String,
    link: Option<String>,
}

impl From<ResourceRow> for ResourceRecord {
    fn from(row: ResourceRow) -> Self {
        ResourceRecord {
            id: row.id.to_string(),
            title: row.title,
            kind: row.kind,
            description: row.description,
            link: row.link.unwrap_or_default(),
        }
        .normalized()
    }
}

const ANNOUNCEMENT_COLUMNS: &str = "id, title, body, date, pinned";
const RESOURCE_COLUMNS: &str = r#"id, title, "type" AS kind, description, link"#;

pub fn change_channel(kind: RecordKind) -> String {
    format!("{}_changed", kind.collection())
}

fn remote(e: sqlx::Error) -> BoardError {
    BoardError::RemoteUnavailable(e.to_string())
}

#[async_trait]
impl StructuredStore for PostgresStore {
    async fn fetch_announcements(&self) -> Result<Vec<AnnouncementRecord>, BoardError> {
        let query = format!(
            "SELECT {ANNOUNCEMENT_COLUMNS} FROM announcements ORDER BY date DESC NULLS LAST"
        );
        let rows = sqlx::query_as::<_, AnnouncementRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(remote)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn fetch_resources(&self) -> Result<Vec<ResourceRecord>, BoardError> {
        let query = format!("SELECT {RESOURCE_COLUMNS} FROM resources ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, ResourceRow>(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(remote)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_announcement(
        &self,
        req: NewAnnouncementRequest,
    ) -> Result<AnnouncementRecord, BoardError> {
        let date = match req.date.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(raw) => parse_date(raw)
                .ok_or_else(|| BoardError::DecodeFailure(format!("unrecognised date: {raw}")))?,
            None => Utc::now(),
        };

        let query = format!(
            "INSERT INTO announcements (id, title, body, date, pinned) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {ANNOUNCEMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AnnouncementRow>(&query)
            .bind(Uuid::new_v4())
            .bind(req.title)
            .bind(req.body)
            .bind(date)
            .bind(req.pinned)
            .fetch_one(&self.pool)
            .await
            .map_err(remote)?;
        Ok(row.into())
    }

    async fn create_resource(&self, req: NewResourceRequest) -> Result<ResourceRecord, BoardError> {
        let link = Some(req.link).filter(|l| !l.trim().is_empty());
        let query = format!(
            r#"INSERT INTO resources (id, title, "type", description, link) VALUES ($1, $2, $3, $4, $5) RETURNING {RESOURCE_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, ResourceRow>(&query)
            .bind(Uuid::new_v4())
            .bind(req.title)
            .bind(req.kind)
            .bind(req.description)
            .bind(link)
            .fetch_one(&self.pool)
            .await
            .map_err(remote)?;
        Ok(row.into())
    }

    async fn listen(&self, kind: RecordKind) -> Result<ChangeFeed, BoardError> {
        let mut listener = PgListener::connect_with(&self.pool).await.map_err(remote)?;
        listener.listen(&change_channel(kind)).await.map_err(remote)?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            // Ends as soon as the feed is dropped, releasing the listener connection.
            loop {
                let event = tokio::select! {
                    _ = tx.closed() => break,
                    event = listener.recv() => event.map(|_| ()).map_err(remote),
                };
                let failed = event.is_err();
                if tx.send(event).await.is_err() {
                    break;
                }
                if failed {
                    // PgListener reconnects on the next recv; don't spin while the server is down.
                    tokio::select! {
                        _ = tx.closed() => break,
                        _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                    }
                }
            }
            tracing::debug!(collection = kind.collection(), "change listener released");
        });
        Ok(rx)
    }
}

// 4. The Mock Implementation (For Tests)
/// MockStore
///
/// In-memory store with a failure switch and a fetch counter. Writes and
/// `replace_*` calls notify listeners of the affected collection.
pub struct MockStore {
    announcements: Mutex<Vec<AnnouncementRecord>>,
    resources: Mutex<Vec<ResourceRecord>>,
    should_fail: AtomicBool,
    fetches: AtomicUsize,
    changes: broadcast::Sender<RecordKind>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new(vec![], vec![])
    }
}

impl MockStore {
    pub fn new(announcements: Vec<AnnouncementRecord>, resources: Vec<ResourceRecord>) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            announcements: Mutex::new(announcements),
            resources: Mutex::new(resources),
            should_fail: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            changes,
        }
    }

    /// When true, every operation fails with `RemoteUnavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// Number of collection reads served (successful or not).
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of open change listeners.
    pub fn listeners(&self) -> usize {
        self.changes.receiver_count()
    }

    pub fn replace_announcements(&self, items: Vec<AnnouncementRecord>) {
        if let Ok(mut guard) = self.announcements.lock() {
            *guard = items;
        }
        let _ = self.changes.send(RecordKind::Announcements);
    }

    pub fn replace_resources(&self, items: Vec<ResourceRecord>) {
        if let Ok(mut guard) = self.resources.lock() {
            *guard = items;
        }
        let _ = self.changes.send(RecordKind::Resources);
    }

    fn check(&self) -> Result<(), BoardError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(BoardError::RemoteUnavailable(
                "Mock Store Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StructuredStore for MockStore {
    async fn fetch_announcements(&self) -> Result<Vec<AnnouncementRecord>, BoardError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.announcements.lock().map(|g| g.clone()).unwrap_or_default())
    }

    async fn fetch_resources(&self) -> Result<Vec<ResourceRecord>, BoardError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.resources.lock().map(|g| g.clone()).unwrap_or_default())
    }

    async fn create_announcement(
        &self,
        req: NewAnnouncementRequest,
    ) -> Result<AnnouncementRecord, BoardError> {
        self.check()?;
        let record = AnnouncementRecord {
            id: Uuid::new_v4().to_string(),
            title: req.title,
            body: req.body,
            date: Some(req.date.unwrap_or_else(|| canonical_timestamp(Utc::now()))),
            pinned: req.pinned,
        }
        .normalized();

        if let Ok(mut guard) = self.announcements.lock() {
            guard.push(record.clone());
        }
        let _ = self.changes.send(RecordKind::Announcements);
        Ok(record)
    }

    async fn create_resource(&self, req: NewResourceRequest) -> Result<ResourceRecord, BoardError> {
        self.check()?;
        let record = ResourceRecord {
            id: Uuid::new_v4().to_string(),
            title: req.title,
            kind: req.kind,
            description: req.description,
            link: req.link,
        }
        .normalized();

        if let Ok(mut guard) = self.resources.lock() {
            guard.push(record.clone());
        }
        let _ = self.changes.send(RecordKind::Resources);
        Ok(record)
    }

    async fn listen(&self, kind: RecordKind) -> Result<ChangeFeed, BoardError> {
        self.check()?;
        let mut changes = self.changes.subscribe();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            loop {
                let changed = tokio::select! {
                    _ = tx.closed() => break,
                    changed = changes.recv() => changed,
                };
                let relevant = match changed {
                    Ok(changed) => changed == kind,
                    // Missed signals may have included this collection.
                    Err(broadcast::error::RecvError::Lagged(_)) => true,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if relevant && tx.send(Ok(())).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

/// MockConnector
///
/// Hands out a shared [`MockStore`]; can be switched to refuse connections.
pub struct MockConnector {
    store: Arc<MockStore>,
    should_fail: AtomicBool,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(store: Arc<MockStore>) -> Self {
        Self {
            store,
            should_fail: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn new_failing(store: Arc<MockStore>) -> Self {
        let connector = Self::new(store);
        connector.set_failing(true);
        connector
    }

    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// Number of connection attempts that reached the connector.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MockConnector {
    async fn connect(&self, _config: &StoreConfig) -> Result<StoreHandle, BoardError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(BoardError::RemoteUnavailable(
                "Mock Connector Error: Simulation requested".to_string(),
            ));
        }
        let handle: StoreHandle = self.store.clone();
        Ok(handle)
    }
}

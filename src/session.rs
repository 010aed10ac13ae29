use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::credentials::{CredentialState, digest_eq, hash_password};
use crate::error::AuthError;
use crate::models::SessionView;
use crate::renderer::RendererState;
use crate::structured::StructuredClient;

/// Lifetime of a persisted session token.
const SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

// --- Persisted Session Slot ---

/// SessionSlot
///
/// Restorable storage for the signed-in admin id, kept across restarts.
#[async_trait]
pub trait SessionSlot: Send + Sync {
    async fn load(&self) -> Option<String>;

    async fn store(&self, admin_id: &str);

    async fn clear(&self);
}

pub type SessionSlotState = Arc<dyn SessionSlot>;

/// SlotClaims
///
/// Payload of the token written to the slot file. `sub` is the admin id.
#[derive(Debug, Serialize, Deserialize)]
pub struct SlotClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// FileSessionSlot
///
/// Keeps the admin id in a file as an HS256 token, so a hand-edited file cannot
/// name a different admin. A missing, expired or tampered token reads as empty.
pub struct FileSessionSlot {
    path: PathBuf,
    secret: String,
}

impl FileSessionSlot {
    pub fn new(path: impl Into<PathBuf>, secret: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl SessionSlot for FileSessionSlot {
    async fn load(&self) -> Option<String> {
        let token = tokio::fs::read_to_string(&self.path).await.ok()?;
        let key = DecodingKey::from_secret(self.secret.as_bytes());

        let mut validation = Validation::default();
        validation.validate_exp = true;

        match decode::<SlotClaims>(token.trim(), &key, &validation) {
            Ok(data) => Some(data.claims.sub),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "session slot rejected: {}", e);
                None
            }
        }
    }

    async fn store(&self, admin_id: &str) {
        let now = Utc::now().timestamp();
        let claims = SlotClaims {
            sub: admin_id.to_string(),
            iat: now as usize,
            exp: (now + SESSION_TTL_SECS) as usize,
        };

        let token = match encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        ) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("session token encoding failed: {}", e);
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&self.path, token).await {
            tracing::error!(path = %self.path.display(), "session slot write failed: {}", e);
        }
    }

    async fn clear(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::error!(path = %self.path.display(), "session slot clear failed: {}", e),
        }
    }
}

/// MemorySessionSlot
///
/// In-process slot for tests.
#[derive(Default)]
pub struct MemorySessionSlot {
    value: Mutex<Option<String>>,
}

impl MemorySessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(admin_id: &str) -> Self {
        Self {
            value: Mutex::new(Some(admin_id.to_string())),
        }
    }

    pub fn peek(&self) -> Option<String> {
        self.value.lock().ok().and_then(|v| v.clone())
    }
}

#[async_trait]
impl SessionSlot for MemorySessionSlot {
    async fn load(&self) -> Option<String> {
        self.peek()
    }

    async fn store(&self, admin_id: &str) {
        if let Ok(mut value) = self.value.lock() {
            *value = Some(admin_id.to_string());
        }
    }

    async fn clear(&self) {
        if let Ok(mut value) = self.value.lock() {
            *value = None;
        }
    }
}

// --- Admin Gate ---

/// Authorized
///
/// Proof that a request runs on behalf of a signed-in admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub admin_id: String,
}

/// RestoreOutcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Authorized(Authorized),
    /// Nothing to restore, or the stored id no longer resolves; the slot was cleared.
    Cleared,
}

/// AdminGate
///
/// Local credential check plus the signed-in/out state. `admin_id` is present
/// exactly when an admin is signed in.
pub struct AdminGate {
    credentials: CredentialState,
    structured: Arc<StructuredClient>,
    slot: SessionSlotState,
    renderer: RendererState,
    admin_id: Mutex<Option<String>>,
}

impl AdminGate {
    pub fn new(
        credentials: CredentialState,
        structured: Arc<StructuredClient>,
        slot: SessionSlotState,
        renderer: RendererState,
    ) -> Self {
        Self {
            credentials,
            structured,
            slot,
            renderer,
            admin_id: Mutex::new(None),
        }
    }

    pub fn view(&self) -> SessionView {
        let admin_id = self.current_admin();
        SessionView {
            signed_in: admin_id.is_some(),
            admin_id,
        }
    }

    pub fn current_admin(&self) -> Option<String> {
        self.admin_id.lock().ok().and_then(|id| id.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_admin().is_some()
    }

    fn set_admin(&self, admin_id: Option<String>) {
        if let Ok(mut current) = self.admin_id.lock() {
            *current = admin_id.clone();
        }
        self.renderer
            .session_state_changed(admin_id.is_some(), admin_id.as_deref());
    }

    /// login
    ///
    /// Admin features need a live structured handle, so that is checked first.
    /// The password is hashed and compared against the stored digest; it is
    /// never logged. Failures leave the session state untouched.
    pub async fn login(&self, id: &str, password: &str) -> Result<Authorized, AuthError> {
        if !self.structured.is_live() {
            return Err(AuthError::StoreUnavailable);
        }

        let credential = self.credentials.get(id).ok_or_else(|| {
            tracing::warn!(admin_id = %id, "login rejected: unknown id");
            AuthError::UnknownId
        })?;

        if !digest_eq(&hash_password(password), &credential.password_hash) {
            tracing::warn!(admin_id = %id, "login rejected: wrong password");
            return Err(AuthError::WrongPassword);
        }

        self.slot.store(id).await;
        self.set_admin(Some(id.to_string()));
        tracing::info!(admin_id = %id, "admin signed in");

        Ok(Authorized {
            admin_id: id.to_string(),
        })
    }

    /// restore_session
    ///
    /// Signs the stored id back in without a password when it still resolves in
    /// the credential store; otherwise clears the stale slot and stays signed out.
    pub async fn restore_session(&self, stored_id: &str) -> RestoreOutcome {
        if self.credentials.contains(stored_id) {
            self.set_admin(Some(stored_id.to_string()));
            tracing::info!(admin_id = %stored_id, "admin session restored");
            return RestoreOutcome::Authorized(Authorized {
                admin_id: stored_id.to_string(),
            });
        }

        tracing::info!(admin_id = %stored_id, "stored admin id no longer valid, clearing session");
        self.slot.clear().await;
        self.set_admin(None);
        RestoreOutcome::Cleared
    }

    /// Restores from whatever the persisted slot holds.
    pub async fn restore_from_slot(&self) -> RestoreOutcome {
        match self.slot.load().await {
            Some(stored_id) => self.restore_session(&stored_id).await,
            None => {
                self.slot.clear().await;
                RestoreOutcome::Cleared
            }
        }
    }

    /// Clears the signed-in state and the persisted slot unconditionally.
    pub async fn logout(&self) {
        let previous = self.current_admin();
        self.slot.clear().await;
        self.set_admin(None);
        if let Some(id) = previous {
            tracing::info!(admin_id = %id, "admin signed out");
        }
    }

    pub fn authorize_create(&self) -> Result<Authorized, AuthError> {
        self.current_admin()
            .map(|admin_id| Authorized { admin_id })
            .ok_or(AuthError::NotSignedIn)
    }
}

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BoardError;

/// Substring that marks an unfilled template value in the store descriptor.
pub const PLACEHOLDER_MARKER: &str = "REPLACE";

/// AppConfig
///
/// Holds the board's entire configuration. Immutable once loaded and shared by
/// the pipeline, the scheduler, the admin gate and the HTTP layer.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and secret fail-fast.
    pub env: Env,
    // Descriptor of the remote structured store (also drives the REST fallback).
    pub store: StoreConfig,
    pub scheduler: SchedulerConfig,
    // Directory of the local snapshot (announcements.json, resources.json, admins.json).
    pub data_dir: PathBuf,
    // File backing the restorable admin session slot.
    pub session_file: PathBuf,
    // HMAC secret used to sign the session slot token.
    pub session_secret: String,
    pub bind_addr: String,
}

/// Env
///
/// Local development versus production deployment.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// StoreConfig
///
/// Connection descriptor for the structured store. The six descriptor fields use
/// their camelCase names on the wire; `databaseUrl` is the structured backend
/// endpoint and `restBaseUrl` overrides the REST document endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_domain: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub storage_bucket: Option<String>,
    #[serde(default)]
    pub messaging_sender_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub rest_base_url: Option<String>,
}

impl StoreConfig {
    /// from_file
    ///
    /// Reads a JSON descriptor. Any failure yields an empty descriptor, which
    /// later fails validation and sends the pipeline down the fallback chain.
    pub fn from_file(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), "store config unreadable: {}", e);
                return Self::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "store config malformed: {}", e);
            Self::default()
        })
    }

    /// Reads the descriptor from `STORE_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            api_key: optional_var("STORE_API_KEY"),
            auth_domain: optional_var("STORE_AUTH_DOMAIN"),
            project_id: optional_var("STORE_PROJECT_ID"),
            storage_bucket: optional_var("STORE_STORAGE_BUCKET"),
            messaging_sender_id: optional_var("STORE_MESSAGING_SENDER_ID"),
            app_id: optional_var("STORE_APP_ID"),
            database_url: optional_var("STORE_DATABASE_URL"),
            rest_base_url: optional_var("STORE_REST_BASE_URL"),
        }
    }

    /// Name of the first credential field still holding a placeholder value.
    pub fn placeholder_field(&self) -> Option<&'static str> {
        [
            ("apiKey", &self.api_key),
            ("authDomain", &self.auth_domain),
            ("projectId", &self.project_id),
            ("storageBucket", &self.storage_bucket),
            ("messagingSenderId", &self.messaging_sender_id),
            ("appId", &self.app_id),
        ]
        .into_iter()
        .find(|(_, value)| value.as_deref().is_some_and(is_placeholder))
        .map(|(name, _)| name)
    }

    /// validate
    ///
    /// A descriptor is usable only with a present, non-placeholder `apiKey` and
    /// no placeholder in any other credential field.
    pub fn validate(&self) -> Result<(), BoardError> {
        match self.api_key.as_deref() {
            None | Some("") => {
                return Err(BoardError::ConfigInvalid("apiKey is missing".to_string()));
            }
            _ => {}
        }
        if let Some(field) = self.placeholder_field() {
            return Err(BoardError::ConfigInvalid(format!(
                "{field} still holds a placeholder value"
            )));
        }
        Ok(())
    }

    /// rest_credentials
    ///
    /// `(apiKey, projectId)` when both are present and valid; the REST fallback
    /// is only attempted when this returns `Some`.
    pub fn rest_credentials(&self) -> Option<(&str, &str)> {
        let key = self.api_key.as_deref().filter(|k| !k.is_empty())?;
        let project = self.project_id.as_deref().filter(|p| !p.is_empty())?;
        if is_placeholder(key) || is_placeholder(project) {
            return None;
        }
        Some((key, project))
    }
}

fn is_placeholder(value: &str) -> bool {
    value.contains(PLACEHOLDER_MARKER)
}

/// SchedulerConfig
///
/// Background refresh cadence. Tunable, not fixed law.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerConfig {
    // Steady-state period between refreshes while Live.
    pub refresh_interval: Duration,
    // Period between initialization attempts while Retrying.
    pub retry_interval: Duration,
    // Idle time after which periodic ticks are skipped.
    pub inactivity_threshold: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
            retry_interval: Duration::from_secs(60),
            inactivity_threshold: Duration::from_secs(600),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            refresh_interval: secs_var("REFRESH_INTERVAL_SECS", defaults.refresh_interval),
            retry_interval: secs_var("RETRY_INTERVAL_SECS", defaults.retry_interval),
            inactivity_threshold: secs_var("INACTIVITY_THRESHOLD_SECS", defaults.inactivity_threshold),
        }
    }
}

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for test setup: no remote store,
    /// snapshot in `data/`, session slot in the working directory.
    fn default() -> Self {
        Self {
            env: Env::Local,
            store: StoreConfig::default(),
            scheduler: SchedulerConfig::default(),
            data_dir: PathBuf::from("data"),
            session_file: PathBuf::from(".board-session"),
            session_secret: "local-board-session-secret".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables at startup.
    /// `STORE_CONFIG_FILE` takes precedence over the individual `STORE_*` variables.
    ///
    /// # Panics
    /// Panics in production when `SESSION_SECRET` is not set, so the service never
    /// starts with a guessable session signing key.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()).as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let session_secret = match env {
            Env::Production => env::var("SESSION_SECRET")
                .expect("FATAL: SESSION_SECRET must be set in production."),
            Env::Local => env::var("SESSION_SECRET")
                .unwrap_or_else(|_| "local-board-session-secret".to_string()),
        };

        let store = match optional_var("STORE_CONFIG_FILE") {
            Some(path) => StoreConfig::from_file(Path::new(&path)),
            None => StoreConfig::from_env(),
        };

        Self {
            env,
            store,
            scheduler: SchedulerConfig::from_env(),
            data_dir: optional_var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| "data".into()),
            session_file: optional_var("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| ".board-session".into()),
            session_secret,
            bind_addr: optional_var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secs_var(key: &str, default: Duration) -> Duration {
    match optional_var(key).map(|raw| raw.parse::<u64>()) {
        Some(Ok(secs)) => Duration::from_secs(secs),
        Some(Err(e)) => {
            tracing::warn!("Invalid {key} value: {e}, using default");
            default
        }
        None => default,
    }
}

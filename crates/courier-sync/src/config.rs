//! # Uploader Configuration
//!
//! Configuration management for the upload engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     COURIER_ENDPOINT_URL=https://example.com/upload                    │
//! │     COURIER_BACKEND=relational                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/courier/courier.toml (Linux)                             │
//! │     ~/Library/Application Support/com.courier.courier/courier.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     namespace "uploader", store "files", fixed 5s retry                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # courier.toml
//! [queue]
//! namespace = "uploader"
//! store = "files"
//!
//! [endpoint]
//! url = "http://localhost:8080/upload"
//! request_timeout_secs = 30
//!
//! [retry]
//! delay_ms = 5000
//! multiplier = 1.0
//! max_attempts = 0   # 0 = retry forever
//!
//! [backends]
//! object_store = true
//! relational_store = true
//! preference = "auto"  # auto | object | relational
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use courier_core::validation::{validate_namespace, validate_store_name};
use courier_core::{BackendPreference, Capabilities, DEFAULT_NAMESPACE, DEFAULT_STORE_NAME};
use courier_store::StoreConfig;

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;

// =============================================================================
// Queue Settings
// =============================================================================

/// Where the queue is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Database namespace (names the files on disk).
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Logical store / table name.
    #[serde(default = "default_store")]
    pub store: String,

    /// Data directory. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_store() -> String {
    DEFAULT_STORE_NAME.to_string()
}

impl Default for QueueSettings {
    fn default() -> Self {
        QueueSettings {
            namespace: default_namespace(),
            store: default_store(),
            data_dir: None,
        }
    }
}

// =============================================================================
// Endpoint Settings
// =============================================================================

/// The remote endpoint items are delivered to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// Upload URL (http or https).
    #[serde(default = "default_url")]
    pub url: String,

    /// TCP connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:8080/upload".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for EndpointSettings {
    fn default() -> Self {
        EndpointSettings {
            url: default_url(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Retry behavior for failed uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Delay after the first failure (milliseconds).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Delay growth factor. 1.0 = fixed delay.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Maximum grown delay (seconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    /// Failed attempts before giving up.
    /// Set to 0 for infinite retries.
    #[serde(default)]
    pub max_attempts: u32,
}

fn default_delay_ms() -> u64 {
    5000
}
fn default_multiplier() -> f64 {
    1.0
}
fn default_max_delay() -> u64 {
    60
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            delay_ms: default_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_secs: default_max_delay(),
            max_attempts: 0, // Infinite
        }
    }
}

// =============================================================================
// Backend Settings
// =============================================================================

/// Which persistence engines the platform offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Backend A (redb) is usable.
    #[serde(default = "default_true")]
    pub object_store: bool,

    /// Backend B (SQLite) is usable.
    #[serde(default = "default_true")]
    pub relational_store: bool,

    /// Host restriction applied on top of the two flags.
    #[serde(default)]
    pub preference: BackendPreference,
}

fn default_true() -> bool {
    true
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            object_store: true,
            relational_store: true,
            preference: BackendPreference::Auto,
        }
    }
}

// =============================================================================
// Main Uploader Configuration
// =============================================================================

/// Complete uploader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Queue location.
    #[serde(default)]
    pub queue: QueueSettings,

    /// Remote endpoint.
    #[serde(default)]
    pub endpoint: EndpointSettings,

    /// Retry behavior.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Available backends.
    #[serde(default)]
    pub backends: BackendSettings,
}

impl UploaderConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (courier.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading uploader config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Uploader config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        validate_namespace(&self.queue.namespace)?;
        validate_store_name(&self.queue.store)?;

        let url = url::Url::parse(&self.endpoint.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "Endpoint URL must start with http:// or https://, got: {}",
                self.endpoint.url
            )));
        }

        if self.retry.delay_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "retry delay_ms must be greater than 0".into(),
            ));
        }

        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(SyncError::InvalidConfig(
                "retry multiplier must be at least 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("COURIER_ENDPOINT_URL") {
            debug!(url = %url, "Overriding endpoint URL from environment");
            self.endpoint.url = url;
        }

        if let Ok(namespace) = std::env::var("COURIER_NAMESPACE") {
            self.queue.namespace = namespace;
        }

        if let Ok(store) = std::env::var("COURIER_STORE") {
            self.queue.store = store;
        }

        if let Ok(dir) = std::env::var("COURIER_DATA_DIR") {
            self.queue.data_dir = Some(PathBuf::from(dir));
        }

        if let Ok(delay) = std::env::var("COURIER_RETRY_DELAY_MS") {
            if let Ok(ms) = delay.parse::<u64>() {
                self.retry.delay_ms = ms;
            }
        }

        if let Ok(attempts) = std::env::var("COURIER_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse::<u32>() {
                self.retry.max_attempts = n;
            }
        }

        if let Ok(backend) = std::env::var("COURIER_BACKEND") {
            match backend.parse() {
                Ok(preference) => {
                    debug!(backend = %backend, "Overriding backend preference from environment");
                    self.backends.preference = preference;
                }
                Err(_) => warn!(backend = %backend, "Unknown backend in environment"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "courier", "courier")
            .map(|dirs| dirs.config_dir().join("courier.toml"))
    }

    /// Returns the default data directory.
    pub fn default_data_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "courier", "courier")
            .map(|dirs| dirs.data_dir().to_path_buf())
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Resolved data directory (configured, platform default, or `./courier-data`).
    pub fn data_dir(&self) -> PathBuf {
        self.queue
            .data_dir
            .clone()
            .or_else(Self::default_data_dir)
            .unwrap_or_else(|| PathBuf::from("courier-data"))
    }

    /// Storage configuration for the backends.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(self.data_dir())
            .namespace(self.queue.namespace.clone())
            .store_name(self.queue.store.clone())
    }

    /// Capability descriptor after applying the preference.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            object_store: self.backends.object_store,
            relational_store: self.backends.relational_store,
        }
        .restrict(self.backends.preference)
    }

    /// Retry policy for uploads.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.retry.delay_ms),
            multiplier: self.retry.multiplier,
            max_delay: Duration::from_secs(self.retry.max_delay_secs),
            max_attempts: self.retry.max_attempts,
        }
    }

    /// TCP connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.connect_timeout_secs)
    }

    /// Whole-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::BackendKind;

    #[test]
    fn test_default_config() {
        let config = UploaderConfig::default();
        assert_eq!(config.queue.namespace, "uploader");
        assert_eq!(config.queue.store, "files");
        assert_eq!(config.retry.delay_ms, 5000);
        assert_eq!(config.retry.max_attempts, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_retry_policy_is_fixed_and_unbounded() {
        let policy = UploaderConfig::default().retry_policy();
        assert_eq!(policy, RetryPolicy::default());
        assert!(policy.is_unbounded());
    }

    #[test]
    fn test_config_validation() {
        let mut config = UploaderConfig::default();

        config.endpoint.url = "ftp://example.com/upload".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.endpoint.url = "not a url".into();
        assert!(config.validate().is_err());

        config.endpoint.url = "https://example.com/upload".into();
        assert!(config.validate().is_ok());

        config.queue.store = "files; DROP".into();
        assert!(matches!(config.validate(), Err(SyncError::Validation(_))));
        config.queue.store = "files".into();

        config.retry.delay_ms = 0;
        assert!(config.validate().is_err());
        config.retry.delay_ms = 100;

        config.retry.multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_capabilities_follow_preference() {
        let mut config = UploaderConfig::default();
        assert_eq!(config.capabilities().select_backend(), Some(BackendKind::ObjectStore));

        config.backends.preference = BackendPreference::Relational;
        assert_eq!(config.capabilities().select_backend(), Some(BackendKind::Relational));

        config.backends.relational_store = false;
        assert!(!config.capabilities().is_offline_capable());
    }

    #[test]
    fn test_toml_partial_file() {
        let config: UploaderConfig = toml::from_str(
            r#"
            [endpoint]
            url = "https://example.com/api"

            [retry]
            multiplier = 2.0
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.endpoint.url, "https://example.com/api");
        assert_eq!(config.endpoint.request_timeout_secs, 30);
        assert_eq!(config.retry.delay_ms, 5000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.queue.store, "files");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("courier.toml");

        let mut config = UploaderConfig::default();
        config.queue.store = "outbox".into();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[queue]"));
        assert!(contents.contains("[retry]"));

        let reloaded: UploaderConfig = toml::from_str(&contents).unwrap();
        assert_eq!(reloaded.queue.store, "outbox");
    }

    #[test]
    fn test_store_config_uses_queue_settings() {
        let mut config = UploaderConfig::default();
        config.queue.data_dir = Some(PathBuf::from("/tmp/courier-test"));
        config.queue.namespace = "app".into();

        let store = config.store_config();
        assert_eq!(store.sqlite_path(), PathBuf::from("/tmp/courier-test/app.sqlite3"));
        assert_eq!(store.store_name, "files");
    }
}

//! # Sync Error Types
//!
//! Error types for the upload engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Facade      │  │     Upload              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Unsupported    │  │  Status(code)           │ │
//! │  │  InvalidUrl     │  │  NoBackend...   │  │  Transport              │ │
//! │  │  ConfigLoad...  │  │  Rejected       │  │  Timeout                │ │
//! │  │  ConfigSave...  │  │  Validation     │  │  GaveUp                 │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Store(StoreError)   connect / store / peek / delete failures  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Upload errors never reach the caller of `enqueue`: the retrying uploader
//! absorbs them and only reports them through the event emitter.

use courier_core::ValidationError;
use courier_store::StoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// A failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The endpoint answered outside the 2xx class.
    #[error("Endpoint returned status {0}")]
    Status(u16),

    /// The request never got a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// A bounded retry policy ran out of attempts.
    #[error("Gave up after {attempts} attempts")]
    GaveUp { attempts: u32 },
}

impl UploadError {
    /// Returns true if the same request may succeed later.
    ///
    /// Every single-attempt failure is retryable; only an exhausted policy
    /// is final.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UploadError::GaveUp { .. })
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UploadError::Timeout
        } else if let Some(status) = err.status() {
            UploadError::Status(status.as_u16())
        } else {
            UploadError::Transport(err.to_string())
        }
    }
}

/// Upload engine error type.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid uploader configuration.
    #[error("Invalid uploader configuration: {0}")]
    InvalidConfig(String),

    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Facade Errors
    // =========================================================================
    /// No backend is connected, so offline queueing is unavailable.
    #[error("Offline queueing is not supported: no backend connected")]
    Unsupported,

    /// The capability descriptor allows no backend.
    #[error("No persistence backend available on this platform")]
    NoBackendAvailable,

    /// A `before_queue` listener vetoed the item.
    #[error("Item '{name}' was rejected before queueing")]
    Rejected { name: String },

    /// Item failed validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// Backend operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Upload failed for good.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::InvalidConfig(format!("HTTP client: {}", err))
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the operation can be retried later.
    ///
    /// ## Retryable Errors
    /// - Upload failures before a policy gave up
    /// - Backend transaction failures and lost connections
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Vetoed or invalid items
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Upload(e) => e.is_retryable(),
            SyncError::Store(e) => matches!(
                e,
                StoreError::TransactionFailed(_)
                    | StoreError::ConnectionFailed(_)
                    | StoreError::NotConnected
            ),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_errors_are_retryable_until_given_up() {
        assert!(UploadError::Status(500).is_retryable());
        assert!(UploadError::Status(404).is_retryable());
        assert!(UploadError::Transport("refused".into()).is_retryable());
        assert!(UploadError::Timeout.is_retryable());
        assert!(!UploadError::GaveUp { attempts: 3 }.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Upload(UploadError::Timeout).is_retryable());
        assert!(SyncError::Store(StoreError::NotConnected).is_retryable());

        assert!(!SyncError::Unsupported.is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::Rejected { name: "a".into() }.is_retryable());
    }

    #[test]
    fn test_config_errors() {
        assert!(SyncError::InvalidUrl("ftp://x".into()).is_config_error());
        assert!(SyncError::ConfigLoadFailed("io".into()).is_config_error());
        assert!(!SyncError::Unsupported.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::Rejected {
            name: "secret.txt".into(),
        };
        assert!(err.to_string().contains("secret.txt"));
        assert_eq!(UploadError::Status(503).to_string(), "Endpoint returned status 503");
    }
}

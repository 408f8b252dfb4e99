//! # Store Error Types
//!
//! Error types for queue backend operations.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         StoreError                                      │
//! │                                                                         │
//! │  connect()      ConnectionFailed   engine unavailable / file locked     │
//! │                 MigrationFailed    schema could not be built            │
//! │                                                                         │
//! │  store()        TransactionFailed  write did not commit                 │
//! │  delete()       TransactionFailed  write did not commit                 │
//! │                 NotFound           no item with that key                │
//! │                                                                         │
//! │  any op         NotConnected       called before connect / after        │
//! │                                    disconnect                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use courier_core::{QueueKey, ValidationError};
use thiserror::Error;

/// Queue backend errors.
///
/// These errors wrap engine errors (sqlx, redb) and provide enough context
/// for the drain controller to decide that a cycle must halt.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The engine could not be opened.
    ///
    /// ## When This Occurs
    /// - Data directory cannot be created
    /// - Database file is locked by another handle
    /// - File permissions issue
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Building the store structures failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Operation attempted on a closed backend.
    #[error("Backend is not connected")]
    NotConnected,

    /// A read or write transaction could not commit.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// No item with the given key.
    #[error("Queue item not found: {key}")]
    NotFound { key: QueueKey },

    /// A persisted record could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Backend configuration rejected.
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    /// Internal backend error.
    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns true if this error came out of `connect()`.
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed(_) | StoreError::MigrationFailed(_)
        )
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::PoolClosed     → StoreError::NotConnected
/// sqlx::Error::PoolTimedOut   → StoreError::TransactionFailed
/// sqlx::Error::Database       → StoreError::TransactionFailed
/// sqlx::Error::Io             → StoreError::ConnectionFailed
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed => StoreError::NotConnected,
            sqlx::Error::PoolTimedOut => {
                StoreError::TransactionFailed("connection pool timed out".to_string())
            }
            sqlx::Error::Database(db_err) => StoreError::TransactionFailed(db_err.message().to_string()),
            sqlx::Error::Io(io) => StoreError::ConnectionFailed(io.to_string()),
            other => StoreError::Internal(other.to_string()),
        }
    }
}

/// Convert redb errors to StoreError.
///
/// Every redb error type (`DatabaseError`, `TransactionError`, `TableError`,
/// `StorageError`, `CommitError`) converts into `redb::Error`, so the object
/// store funnels its blocking closures through this one mapping.
impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        match err {
            redb::Error::DatabaseAlreadyOpen => {
                StoreError::ConnectionFailed("database is already open".to_string())
            }
            redb::Error::Io(io) => StoreError::ConnectionFailed(io.to_string()),
            redb::Error::TableDoesNotExist(table) => {
                StoreError::TransactionFailed(format!("store '{}' does not exist", table))
            }
            other => StoreError::TransactionFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::ConnectionFailed(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Internal(format!("blocking task failed: {}", err))
    }
}

/// Result type for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_category() {
        assert!(StoreError::ConnectionFailed("locked".into()).is_connect_error());
        assert!(StoreError::MigrationFailed("ddl".into()).is_connect_error());
        assert!(!StoreError::NotConnected.is_connect_error());
        assert!(!StoreError::NotFound {
            key: QueueKey::new(3)
        }
        .is_connect_error());
    }

    #[test]
    fn test_pool_closed_maps_to_not_connected() {
        let err: StoreError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, StoreError::NotConnected));
    }

    #[test]
    fn test_not_found_display() {
        let err = StoreError::NotFound {
            key: QueueKey::new(42),
        };
        assert_eq!(err.to_string(), "Queue item not found: 42");
    }
}

//! # Store Configuration
//!
//! Where the queue lives on disk and how the engines are tuned.
//!
//! ## On-Disk Layout
//! ```text
//! <data_dir>/
//! ├── <namespace>.redb      Backend A (object store)
//! └── <namespace>.sqlite3   Backend B (relational store, + -wal / -shm)
//! ```
//! Both files hold one store per `store_name`, so several queues can share a
//! namespace.

use std::path::PathBuf;
use std::time::Duration;

use courier_core::validation::{validate_namespace, validate_store_name};
use courier_core::{DEFAULT_NAMESPACE, DEFAULT_STORE_NAME};

use crate::error::StoreResult;

/// Backend configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = StoreConfig::new("/var/lib/courier")
///     .namespace("uploader")
///     .store_name("files");
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the database files. Created on connect.
    pub data_dir: PathBuf,

    /// Database namespace (file stem).
    /// Default: "uploader"
    pub namespace: String,

    /// Logical store / table name.
    /// Default: "files"
    pub store_name: String,

    /// Maximum SQLite pool connections.
    /// Default: 4
    pub max_connections: u32,

    /// How long to wait for a connection or a busy database.
    /// Default: 10 seconds
    pub connect_timeout: Duration,
}

impl StoreConfig {
    /// Creates a configuration rooted at the given directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            data_dir: data_dir.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            max_connections: 4,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the store name.
    pub fn store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = store_name.into();
        self
    }

    /// Sets the maximum number of SQLite connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Path of the object-store database file.
    pub fn object_store_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.redb", self.namespace))
    }

    /// Path of the SQLite database file.
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.sqlite3", self.namespace))
    }

    /// Checks identifiers before they reach a file name or a SQL statement.
    pub fn validate(&self) -> StoreResult<()> {
        validate_namespace(&self.namespace)?;
        validate_store_name(&self.store_name)?;
        Ok(())
    }
}

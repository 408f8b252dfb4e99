//! # Queue Backend Trait
//!
//! The contract both persistence engines implement.
//!
//! ## Transaction Boundaries
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation      Transaction   Engine A (redb)        Engine B (SQLite) │
//! │  ─────────────  ───────────   ────────────────────   ───────────────── │
//! │  connect        write         meta + table create    meta + CREATE     │
//! │  store          write         seq bump + insert      INSERT            │
//! │  peek_oldest    read          first() on key range   ORDER BY LIMIT 1  │
//! │  delete         write         remove(key)            DELETE WHERE id   │
//! │  len            read          len()                  COUNT(*)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! Callers never learn which engine is behind the trait object.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{BackendKind, QueueItem, QueueKey};

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::object_store::ObjectStoreBackend;
use crate::sqlite::SqliteBackend;

/// Description of an established backend connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConnection {
    /// Engine behind the connection.
    pub kind: BackendKind,
    /// Schema version recorded next to the store.
    pub version: String,
    /// Logical store name.
    pub store_name: String,
    /// True if this connect built or upgraded the store structures.
    pub migrated: bool,
}

/// A durable FIFO store of queue items.
///
/// Every method other than `connect` fails with
/// [`StoreError::NotConnected`](crate::StoreError::NotConnected) while the
/// backend is closed.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Engine identity (for status reporting only).
    fn kind(&self) -> BackendKind;

    /// Opens the engine, migrating the schema when the stored version differs.
    ///
    /// Calling it on an open backend returns the existing connection.
    async fn connect(&self) -> StoreResult<BackendConnection>;

    /// Releases the engine. No-op when already closed.
    async fn disconnect(&self);

    /// Returns true while connected.
    async fn is_connected(&self) -> bool;

    /// Appends one item in a single write transaction and returns its key.
    async fn store(&self, name: &str, payload: &str) -> StoreResult<QueueKey>;

    /// Reads the item with the smallest key without removing it.
    async fn peek_oldest(&self) -> StoreResult<Option<QueueItem>>;

    /// Removes exactly the item with this key.
    async fn delete(&self, key: QueueKey) -> StoreResult<()>;

    /// Number of queued items.
    async fn len(&self) -> StoreResult<u64>;
}

/// Builds the backend for an engine kind.
///
/// The returned backend is not connected yet.
pub fn open_backend(kind: BackendKind, config: StoreConfig) -> Arc<dyn QueueBackend> {
    match kind {
        BackendKind::ObjectStore => Arc::new(ObjectStoreBackend::new(config)),
        BackendKind::Relational => Arc::new(SqliteBackend::new(config)),
    }
}

/// Behaviour every backend must show, run against both engines.
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use crate::error::StoreError;

    pub async fn assert_fifo_and_delete(backend: &dyn QueueBackend) {
        backend.connect().await.unwrap();

        let a = backend.store("a.txt", "AAAA").await.unwrap();
        let b = backend.store("b.txt", "BBBB").await.unwrap();
        assert_eq!(a, QueueKey::new(1));
        assert!(b > a);
        assert_eq!(backend.len().await.unwrap(), 2);

        // Peek never removes
        let head = backend.peek_oldest().await.unwrap().unwrap();
        let again = backend.peek_oldest().await.unwrap().unwrap();
        assert_eq!(head, again);
        assert_eq!(head, QueueItem::new(a, "a.txt", "AAAA"));

        backend.delete(a).await.unwrap();
        let head = backend.peek_oldest().await.unwrap().unwrap();
        assert_eq!(head.key, b);
        assert_eq!(head.payload, "BBBB");

        backend.delete(b).await.unwrap();
        assert!(backend.peek_oldest().await.unwrap().is_none());
        assert_eq!(backend.len().await.unwrap(), 0);
    }

    pub async fn assert_keys_never_reused(backend: &dyn QueueBackend) {
        backend.connect().await.unwrap();

        let first = backend.store("x", "1").await.unwrap();
        backend.delete(first).await.unwrap();

        // Store is empty again; the next key must still be larger
        let second = backend.store("y", "2").await.unwrap();
        assert!(second > first);
    }

    pub async fn assert_delete_missing_key(backend: &dyn QueueBackend) {
        backend.connect().await.unwrap();
        let key = backend.store("only", "1").await.unwrap();

        let err = backend.delete(key.next()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        // The existing item is untouched
        assert_eq!(backend.peek_oldest().await.unwrap().unwrap().key, key);
    }

    pub async fn assert_closed_backend_rejects(backend: &dyn QueueBackend) {
        assert!(!backend.is_connected().await);
        assert!(matches!(
            backend.store("a", "b").await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            backend.peek_oldest().await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            backend.delete(QueueKey::new(1)).await,
            Err(StoreError::NotConnected)
        ));

        // Disconnect without connect, twice, is fine
        backend.disconnect().await;
        backend.disconnect().await;
    }

    pub async fn assert_connect_idempotent(backend: &dyn QueueBackend) {
        let first = backend.connect().await.unwrap();
        assert!(first.migrated);
        assert_eq!(first.version, courier_core::SCHEMA_VERSION);

        backend.store("a", "1").await.unwrap();

        let second = backend.connect().await.unwrap();
        assert!(!second.migrated);
        assert_eq!(backend.len().await.unwrap(), 1);
    }

    /// Reopens the same files with a fresh backend.
    pub async fn assert_survives_restart(
        before: &dyn QueueBackend,
        after: &dyn QueueBackend,
    ) {
        before.connect().await.unwrap();
        let a = before.store("a.txt", "AAAA").await.unwrap();
        let b = before.store("b.txt", "BBBB").await.unwrap();
        before.disconnect().await;
        before.disconnect().await;

        let conn = after.connect().await.unwrap();
        assert!(!conn.migrated);
        assert_eq!(after.len().await.unwrap(), 2);
        assert_eq!(after.peek_oldest().await.unwrap().unwrap().key, a);
        after.delete(a).await.unwrap();
        assert_eq!(after.peek_oldest().await.unwrap().unwrap().key, b);

        // Keys keep climbing across restarts
        let c = after.store("c.txt", "CCCC").await.unwrap();
        assert!(c > b);
    }
}

//! # Relational Backend (Backend B)
//!
//! SQLite through an sqlx connection pool.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SqliteBackend                                    │
//! │                                                                         │
//! │  RwLock<Option<SqlitePool>>   None = closed, Some = open               │
//! │                                                                         │
//! │  store()        BEGIN; INSERT INTO "<store>" (name, data); COMMIT      │
//! │  peek_oldest()  BEGIN; SELECT ... ORDER BY id ASC LIMIT 1; COMMIT      │
//! │  delete(key)    BEGIN; DELETE ... WHERE id = ?; COMMIT / ROLLBACK      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled so the drain loop's
//! reads never block a caller's enqueue.

use async_trait::async_trait;
use courier_core::{BackendKind, QueueItem, QueueKey, SCHEMA_VERSION};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{BackendConnection, QueueBackend};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::migrations;

/// Row shape of a store table.
#[derive(Debug, sqlx::FromRow)]
struct QueueRow {
    id: i64,
    name: String,
    data: String,
}

impl From<QueueRow> for QueueItem {
    fn from(row: QueueRow) -> Self {
        QueueItem::new(QueueKey::new(row.id as u64), row.name, row.data)
    }
}

/// Relational queue backend.
#[derive(Debug)]
pub struct SqliteBackend {
    config: StoreConfig,
    pool: RwLock<Option<SqlitePool>>,
}

impl SqliteBackend {
    /// Creates a closed backend.
    pub fn new(config: StoreConfig) -> Self {
        SqliteBackend {
            config,
            pool: RwLock::new(None),
        }
    }

    /// Returns the open pool or `NotConnected`.
    async fn pool(&self) -> StoreResult<SqlitePool> {
        self.pool
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(StoreError::NotConnected)
    }

    fn table(&self) -> &str {
        &self.config.store_name
    }

    fn connection(&self, migrated: bool) -> BackendConnection {
        BackendConnection {
            kind: BackendKind::Relational,
            version: SCHEMA_VERSION.to_string(),
            store_name: self.config.store_name.clone(),
            migrated,
        }
    }

    async fn open_pool(&self) -> StoreResult<SqlitePool> {
        std::fs::create_dir_all(&self.config.data_dir)?;
        let path = self.config.sqlite_path();

        info!(path = %path.display(), "Opening relational store");

        let options = SqliteConnectOptions::new()
            .filename(&path)
            // WAL mode: readers don't block writers, writers don't block readers
            .journal_mode(SqliteJournalMode::Wal)
            // FULL synchronous: an acknowledged store survives power loss
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(self.config.connect_timeout)
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(self.config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl QueueBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Relational
    }

    async fn connect(&self) -> StoreResult<BackendConnection> {
        self.config.validate()?;

        let mut guard = self.pool.write().await;
        if guard.is_some() {
            debug!("Relational store already connected");
            return Ok(self.connection(false));
        }

        let pool = self.open_pool().await?;
        let migrated = match migrations::ensure_schema(&pool, self.table()).await {
            Ok(migrated) => migrated,
            Err(e) => {
                pool.close().await;
                return Err(e);
            }
        };

        *guard = Some(pool);
        info!(store = %self.table(), migrated, "Relational store connected");
        Ok(self.connection(migrated))
    }

    async fn disconnect(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            info!("Closing relational store");
            pool.close().await;
        }
    }

    async fn is_connected(&self) -> bool {
        self.pool.read().await.is_some()
    }

    async fn store(&self, name: &str, payload: &str) -> StoreResult<QueueKey> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let result = sqlx::query(&format!(
            r#"INSERT INTO "{}" (name, data) VALUES (?1, ?2)"#,
            self.table()
        ))
        .bind(name)
        .bind(payload)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let key = QueueKey::new(result.last_insert_rowid() as u64);
        debug!(key = %key, name = %name, "Stored item");
        Ok(key)
    }

    async fn peek_oldest(&self) -> StoreResult<Option<QueueItem>> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let row: Option<QueueRow> = sqlx::query_as(&format!(
            r#"SELECT id, name, data FROM "{}" ORDER BY id ASC LIMIT 1"#,
            self.table()
        ))
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.map(QueueItem::from))
    }

    async fn delete(&self, key: QueueKey) -> StoreResult<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        let result = sqlx::query(&format!(r#"DELETE FROM "{}" WHERE id = ?1"#, self.table()))
            .bind(key.get() as i64)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound { key });
        }

        tx.commit().await?;
        debug!(key = %key, "Deleted item");
        Ok(())
    }

    async fn len(&self) -> StoreResult<u64> {
        let pool = self.pool().await?;

        let count: i64 = sqlx::query_scalar(&format!(r#"SELECT COUNT(*) FROM "{}""#, self.table()))
            .fetch_one(&pool)
            .await?;

        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::contract;

    fn backend(dir: &tempfile::TempDir) -> SqliteBackend {
        SqliteBackend::new(StoreConfig::new(dir.path()))
    }

    #[tokio::test]
    async fn test_fifo_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        contract::assert_fifo_and_delete(&backend(&dir)).await;
    }

    #[tokio::test]
    async fn test_keys_never_reused() {
        let dir = tempfile::tempdir().unwrap();
        contract::assert_keys_never_reused(&backend(&dir)).await;
    }

    #[tokio::test]
    async fn test_delete_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        contract::assert_delete_missing_key(&backend(&dir)).await;
    }

    #[tokio::test]
    async fn test_closed_backend_rejects() {
        let dir = tempfile::tempdir().unwrap();
        contract::assert_closed_backend_rejects(&backend(&dir)).await;
    }

    #[tokio::test]
    async fn test_connect_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        contract::assert_connect_idempotent(&backend(&dir)).await;
    }

    #[tokio::test]
    async fn test_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        contract::assert_survives_restart(&backend(&dir), &backend(&dir)).await;
    }

    #[tokio::test]
    async fn test_invalid_store_name_rejected_before_sql() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::new(StoreConfig::new(dir.path()).store_name("x\"; DROP"));

        let err = backend.connect().await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
        assert!(!backend.is_connected().await);
    }

    #[tokio::test]
    async fn test_operations_fail_after_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        backend.connect().await.unwrap();
        backend.store("a", "1").await.unwrap();
        backend.disconnect().await;

        assert!(matches!(
            backend.peek_oldest().await,
            Err(StoreError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connections_sync_fully_in_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir);
        backend.connect().await.unwrap();
        let pool = backend.pool().await.unwrap();

        let synchronous: i64 = sqlx::query_scalar("PRAGMA synchronous")
            .fetch_one(&pool)
            .await
            .unwrap();
        let journal: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();

        // 2 = FULL
        assert_eq!(synchronous, 2);
        assert_eq!(journal.to_lowercase(), "wal");
        backend.disconnect().await;
    }

    #[tokio::test]
    async fn test_internal_table_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for store in ["_courier_meta", "sqlite_sequence"] {
            let backend = SqliteBackend::new(StoreConfig::new(dir.path()).store_name(store));
            assert!(matches!(
                backend.connect().await,
                Err(StoreError::InvalidConfig(_))
            ));
        }
    }
}

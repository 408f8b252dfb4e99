//! # Relational Schema Migrations
//!
//! Versioned schema for the SQLite backend.
//!
//! ## How Versioning Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  connect()                                                              │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  BEGIN                                                                  │
//! │  CREATE TABLE IF NOT EXISTS _courier_meta (store, version)             │
//! │  SELECT version FROM _courier_meta WHERE store = ?                     │
//! │     │                                                                   │
//! │     ├── version == SCHEMA_VERSION ──► COMMIT (nothing to do)           │
//! │     │                                                                   │
//! │     └── missing / different ──► CREATE TABLE IF NOT EXISTS "<store>"   │
//! │                                 UPSERT _courier_meta                   │
//! │                                 COMMIT                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The store table is named after the configured store, so it cannot be an
//! embedded `sqlx::migrate!` file. The whole check-and-build runs in one
//! transaction: a failed migration leaves no half-built store behind.

use courier_core::SCHEMA_VERSION;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{StoreError, StoreResult};

/// Table recording the schema version of each store.
pub const META_TABLE: &str = "_courier_meta";

/// Ensures the store table exists at the current schema version.
///
/// ## Returns
/// * `Ok(true)` - The store was created or upgraded
/// * `Ok(false)` - The recorded version already matched
///
/// ## Safety
/// - Idempotent: safe to run on every connect
/// - Transactional: all-or-nothing
pub async fn ensure_schema(pool: &SqlitePool, store: &str) -> StoreResult<bool> {
    let mut tx = pool.begin().await.map_err(migration_failed)?;

    sqlx::query(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{META_TABLE}" (
            store   TEXT PRIMARY KEY NOT NULL,
            version TEXT NOT NULL
        )"#
    ))
    .execute(&mut *tx)
    .await
    .map_err(migration_failed)?;

    let stored: Option<String> = sqlx::query_scalar(&format!(
        r#"SELECT version FROM "{META_TABLE}" WHERE store = ?1"#
    ))
    .bind(store)
    .fetch_optional(&mut *tx)
    .await
    .map_err(migration_failed)?;

    if stored.as_deref() == Some(SCHEMA_VERSION) {
        tx.commit().await.map_err(migration_failed)?;
        return Ok(false);
    }

    info!(
        store = %store,
        from = stored.as_deref().unwrap_or("none"),
        to = SCHEMA_VERSION,
        "Migrating relational store"
    );

    // AUTOINCREMENT: rowids are never reused, even after the newest row is deleted
    sqlx::query(&format!(
        r#"CREATE TABLE IF NOT EXISTS "{store}" (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            data TEXT NOT NULL
        )"#
    ))
    .execute(&mut *tx)
    .await
    .map_err(migration_failed)?;

    sqlx::query(&format!(
        r#"INSERT INTO "{META_TABLE}" (store, version) VALUES (?1, ?2)
           ON CONFLICT(store) DO UPDATE SET version = excluded.version"#
    ))
    .bind(store)
    .bind(SCHEMA_VERSION)
    .execute(&mut *tx)
    .await
    .map_err(migration_failed)?;

    tx.commit().await.map_err(migration_failed)?;

    info!(store = %store, "Relational store ready");
    Ok(true)
}

/// Returns the recorded schema version of a store, if any.
///
/// ## Usage
/// For diagnostics and tests.
pub async fn schema_version(pool: &SqlitePool, store: &str) -> StoreResult<Option<String>> {
    let version: Option<String> = sqlx::query_scalar(&format!(
        r#"SELECT version FROM "{META_TABLE}" WHERE store = ?1"#
    ))
    .bind(store)
    .fetch_optional(pool)
    .await?;

    Ok(version)
}

fn migration_failed(err: sqlx::Error) -> StoreError {
    StoreError::MigrationFailed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_schema_records_version() {
        let pool = memory_pool().await;

        assert!(ensure_schema(&pool, "files").await.unwrap());
        assert_eq!(
            schema_version(&pool, "files").await.unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );

        // Second run is a no-op
        assert!(!ensure_schema(&pool, "files").await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_version_triggers_migration() {
        let pool = memory_pool().await;
        ensure_schema(&pool, "files").await.unwrap();

        sqlx::query(r#"UPDATE "_courier_meta" SET version = '0.9' WHERE store = 'files'"#)
            .execute(&pool)
            .await
            .unwrap();

        assert!(ensure_schema(&pool, "files").await.unwrap());
        assert_eq!(
            schema_version(&pool, "files").await.unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );
    }

    #[tokio::test]
    async fn test_stores_are_versioned_independently() {
        let pool = memory_pool().await;
        ensure_schema(&pool, "files").await.unwrap();

        assert!(schema_version(&pool, "photos").await.unwrap().is_none());
        assert!(ensure_schema(&pool, "photos").await.unwrap());
    }
}

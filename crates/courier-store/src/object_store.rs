//! # Object-Store Backend (Backend A)
//!
//! An embedded key/value database (redb) holding one table per store.
//!
//! ## Layout
//! ```text
//! <namespace>.redb
//! ├── _courier_meta   store name → schema version
//! ├── _courier_seq    store name → last issued key
//! └── <store_name>    u64 key    → JSON {"name": ..., "data": ...}
//! ```
//!
//! redb is synchronous, so every transaction runs on the blocking pool.
//! The key sequence lives in its own table and is bumped in the same write
//! transaction as the insert, so keys keep climbing after the store empties.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{BackendKind, QueueItem, QueueKey, SCHEMA_VERSION};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition, TableError};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{BackendConnection, QueueBackend};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

const META: TableDefinition<&str, &str> = TableDefinition::new("_courier_meta");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("_courier_seq");

fn items(store: &str) -> TableDefinition<'_, u64, &'static [u8]> {
    TableDefinition::new(store)
}

/// Value stored under each key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    name: String,
    data: String,
}

/// Object-store queue backend.
pub struct ObjectStoreBackend {
    config: StoreConfig,
    db: RwLock<Option<Arc<Database>>>,
}

impl ObjectStoreBackend {
    /// Creates a closed backend.
    pub fn new(config: StoreConfig) -> Self {
        ObjectStoreBackend {
            config,
            db: RwLock::new(None),
        }
    }

    async fn database(&self) -> StoreResult<Arc<Database>> {
        self.db
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(StoreError::NotConnected)
    }

    /// Runs a redb transaction body on the blocking pool.
    async fn run<T, F>(&self, body: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &str) -> Result<T, redb::Error> + Send + 'static,
    {
        let db = self.database().await?;
        let store = self.config.store_name.clone();
        let result = tokio::task::spawn_blocking(move || body(&db, &store)).await??;
        Ok(result)
    }

    fn connection(&self, migrated: bool) -> BackendConnection {
        BackendConnection {
            kind: BackendKind::ObjectStore,
            version: SCHEMA_VERSION.to_string(),
            store_name: self.config.store_name.clone(),
            migrated,
        }
    }
}

/// Opens (or creates) the database file and builds the store tables.
///
/// Returns the handle and whether the schema version had to be written.
fn open_database(config: &StoreConfig) -> StoreResult<(Database, bool)> {
    std::fs::create_dir_all(&config.data_dir)?;
    let db = Database::create(config.object_store_path()).map_err(redb::Error::from)?;

    let migrated = (|| -> Result<bool, redb::Error> {
        let txn = db.begin_write()?;
        let migrated = {
            let mut meta = txn.open_table(META)?;
            let current = meta
                .get(config.store_name.as_str())?
                .map(|v| v.value().to_string());

            txn.open_table(SEQUENCES)?;
            txn.open_table(items(&config.store_name))?;

            if current.as_deref() == Some(SCHEMA_VERSION) {
                false
            } else {
                info!(
                    store = %config.store_name,
                    from = current.as_deref().unwrap_or("none"),
                    to = SCHEMA_VERSION,
                    "Migrating object store"
                );
                meta.insert(config.store_name.as_str(), SCHEMA_VERSION)?;
                true
            }
        };
        txn.commit()?;
        Ok(migrated)
    })()
    .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

    Ok((db, migrated))
}

#[async_trait]
impl QueueBackend for ObjectStoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn connect(&self) -> StoreResult<BackendConnection> {
        self.config.validate()?;

        let mut guard = self.db.write().await;
        if guard.is_some() {
            debug!("Object store already connected");
            return Ok(self.connection(false));
        }

        let config = self.config.clone();
        info!(path = %config.object_store_path().display(), "Opening object store");
        let (db, migrated) = tokio::task::spawn_blocking(move || open_database(&config)).await??;

        *guard = Some(Arc::new(db));
        info!(store = %self.config.store_name, migrated, "Object store connected");
        Ok(self.connection(migrated))
    }

    async fn disconnect(&self) {
        // The file lock is released once in-flight transactions drop their handle
        if self.db.write().await.take().is_some() {
            info!("Closing object store");
        }
    }

    async fn is_connected(&self) -> bool {
        self.db.read().await.is_some()
    }

    async fn store(&self, name: &str, payload: &str) -> StoreResult<QueueKey> {
        let record = serde_json::to_vec(&StoredRecord {
            name: name.to_string(),
            data: payload.to_string(),
        })?;

        let key = self
            .run(move |db, store| {
                let txn = db.begin_write()?;
                let key = {
                    let mut sequences = txn.open_table(SEQUENCES)?;
                    let last = sequences.get(store)?.map(|v| v.value()).unwrap_or(0);
                    let key = last + 1;
                    sequences.insert(store, key)?;

                    let mut table = txn.open_table(items(store))?;
                    table.insert(key, record.as_slice())?;
                    key
                };
                txn.commit()?;
                Ok(key)
            })
            .await?;

        let key = QueueKey::new(key);
        debug!(key = %key, name = %name, "Stored item");
        Ok(key)
    }

    async fn peek_oldest(&self) -> StoreResult<Option<QueueItem>> {
        let head = self
            .run(|db, store| {
                let txn = db.begin_read()?;
                let table = match txn.open_table(items(store)) {
                    Ok(table) => table,
                    Err(TableError::TableDoesNotExist(_)) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };
                let head = table
                    .first()?
                    .map(|(key, value)| (key.value(), value.value().to_vec()));
                Ok(head)
            })
            .await?;

        match head {
            Some((key, bytes)) => {
                let record: StoredRecord = serde_json::from_slice(&bytes)?;
                Ok(Some(QueueItem::new(
                    QueueKey::new(key),
                    record.name,
                    record.data,
                )))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: QueueKey) -> StoreResult<()> {
        let removed = self
            .run(move |db, store| {
                let txn = db.begin_write()?;
                let removed = {
                    let mut table = txn.open_table(items(store))?;
                    let removed = table.remove(key.get())?;
                    removed.is_some()
                };
                if removed {
                    txn.commit()?;
                } else {
                    txn.abort()?;
                }
                Ok(removed)
            })
            .await?;

        if !removed {
            return Err(StoreError::NotFound { key });
        }
        debug!(key = %key, "Deleted item");
        Ok(())
    }

    async fn len(&self) -> StoreResult<u64> {
        self.run(|db, store| {
            let txn = db.begin_read()?;
            match txn.open_table(items(store)) {
                Ok(table) => Ok(table.len()?),
                Err(TableError::TableDoesNotExist(_)) => Ok(0),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

//! # courier-store: Durable Queue Backends
//!
//! Two interchangeable persistence engines behind one async trait.
//!
//! ## Module Structure
//! ```text
//! courier_store/
//! ├── backend.rs       ◄─── QueueBackend trait + open_backend()
//! ├── object_store.rs  ◄─── Backend A: embedded redb key/value store
//! ├── sqlite.rs        ◄─── Backend B: SQLite through sqlx
//! ├── migrations.rs    ◄─── Versioned relational schema
//! ├── config.rs        ◄─── StoreConfig (paths, names, pool tuning)
//! └── error.rs         ◄─── StoreError
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use courier_core::BackendKind;
//! use courier_store::{open_backend, StoreConfig};
//!
//! let backend = open_backend(BackendKind::Relational, StoreConfig::new("./data"));
//! backend.connect().await?;
//! let key = backend.store("report.pdf", "JVBERi0=").await?;
//! ```
//!
//! ## Guarantees
//! - Every `store` and `delete` is its own committed transaction
//! - Keys are strictly increasing per store and never reused
//! - `peek_oldest` returns the smallest key without removing it

pub mod backend;
pub mod config;
pub mod error;
pub mod migrations;
pub mod object_store;
pub mod sqlite;

pub use backend::{open_backend, BackendConnection, QueueBackend};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use object_store::ObjectStoreBackend;
pub use sqlite::SqliteBackend;

//! # courier-sync: Upload Engine for Courier
//!
//! This crate delivers durably queued items to a remote endpoint, enabling
//! offline-first uploads that survive restarts and flaky networks.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Upload Engine Architecture                       │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 OfflineUploader (Public Facade)                  │  │
//! │  │                                                                  │  │
//! │  │  connect() / enqueue() / disconnect() / status()                │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ QueueBackend   │  │DrainController │  │  RetryingUploader      │    │
//! │  │ (courier-store)│  │                │  │                        │    │
//! │  │                │  │ Single-flight  │  │ HttpUploader attempts  │    │
//! │  │ redb or SQLite │  │ peek ► upload  │  │ + RetryPolicy delays   │    │
//! │  │ chosen once    │  │ ► delete loop  │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  EVENTS (QueueEventEmitter):                                           │
//! │  before_queue, queued, queue_failed, queue_empty,                      │
//! │  uploading, upload_succeeded, upload_failed                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`facade`] - `OfflineUploader` entry point and builder
//! - [`drain`] - Single-flight drain loop
//! - [`remote`] - `RemoteUploader` trait, HTTP implementation, retry wrapper
//! - [`retry`] - Retry delay policy
//! - [`events`] - Lifecycle event emitter
//! - [`config`] - Uploader configuration (TOML + environment)
//! - [`error`] - Error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use courier_sync::{LogEmitter, OfflineUploaderBuilder, UploaderConfig};
//!
//! let config = UploaderConfig::load(None)?;
//! let uploader = OfflineUploaderBuilder::from_config(&config)?
//!     .with_emitter(Arc::new(LogEmitter))
//!     .build()?;
//!
//! uploader.connect().await?;
//! uploader.enqueue("report.pdf", &base64_payload).await?;
//! uploader.wait_idle().await;
//! uploader.disconnect().await;
//! ```

pub mod config;
pub mod drain;
pub mod error;
pub mod events;
pub mod facade;
pub mod remote;
pub mod retry;

pub use config::UploaderConfig;
pub use drain::{DrainController, DrainOutcome};
pub use error::{SyncError, SyncResult, UploadError};
pub use events::{LogEmitter, NoOpEmitter, QueueEventEmitter};
pub use facade::{OfflineUploader, OfflineUploaderBuilder, UploaderStatus};
pub use remote::{HttpUploader, RemoteUploader, RetryingUploader};
pub use retry::{RetryPolicy, RetrySchedule};

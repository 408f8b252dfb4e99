//! # Queue Events
//!
//! Lifecycle notifications for the host (UI, logs, metrics).
//!
//! ## Event Order For One Item
//! ```text
//! enqueue("a.txt")
//!   before_queue("a.txt")  ──► false = vetoed, nothing stored
//!   queued(1, "a.txt")     or queue_failed("a.txt", err)
//!
//! drain cycle
//!   uploading("a.txt")
//!   upload_failed("a.txt", err)   once per failed attempt
//!   upload_succeeded("a.txt")     once
//!   queue_empty()                 when the cycle finds nothing left
//! ```
//!
//! Emitters are called inline from the drain task, so implementations must
//! return quickly.

use courier_core::QueueKey;

use crate::error::{SyncError, UploadError};

/// Receives queue lifecycle events. Every method defaults to a no-op.
pub trait QueueEventEmitter: Send + Sync {
    /// Called before an item is stored. Returning false vetoes it.
    fn before_queue(&self, _name: &str) -> bool {
        true
    }

    /// An item was durably stored.
    fn queued(&self, _key: QueueKey, _name: &str) {}

    /// Storing an item failed.
    fn queue_failed(&self, _name: &str, _error: &SyncError) {}

    /// A drain cycle found the store empty.
    fn queue_empty(&self) {}

    /// Delivery of an item is starting.
    fn uploading(&self, _name: &str) {}

    /// The endpoint acknowledged an item.
    fn upload_succeeded(&self, _name: &str) {}

    /// One delivery attempt failed; a retry follows unless the policy gave up.
    fn upload_failed(&self, _name: &str, _error: &UploadError) {}
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl QueueEventEmitter for NoOpEmitter {}

/// Emitter that forwards every event to `tracing`.
///
/// Used by the CLI host.
pub struct LogEmitter;

impl QueueEventEmitter for LogEmitter {
    fn queued(&self, key: QueueKey, name: &str) {
        tracing::info!(key = %key, name = %name, "Queued");
    }

    fn queue_failed(&self, name: &str, error: &SyncError) {
        tracing::error!(name = %name, %error, "Queueing failed");
    }

    fn queue_empty(&self) {
        tracing::info!("Queue empty");
    }

    fn uploading(&self, name: &str) {
        tracing::info!(name = %name, "Uploading");
    }

    fn upload_succeeded(&self, name: &str) {
        tracing::info!(name = %name, "Upload succeeded");
    }

    fn upload_failed(&self, name: &str, error: &UploadError) {
        tracing::warn!(name = %name, %error, "Upload failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_emitter_accepts_everything() {
        let emitter = NoOpEmitter;
        assert!(emitter.before_queue("anything"));
        emitter.queued(QueueKey::new(1), "a");
        emitter.upload_failed("a", &UploadError::Timeout);
        emitter.queue_empty();
    }
}

//! # Offline Upload Facade
//!
//! The public entry point: picks a backend at connect time, stores items and
//! keeps the drain controller running.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  OfflineUploader::builder(store_config)                                 │
//! │      .with_uploader(http)                                               │
//! │      .with_emitter(ui)                                                  │
//! │      .build()?                                                          │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  connect()                                                              │
//! │      Capabilities::select_backend()   object store, else relational    │
//! │      backend.connect()                migrate if version differs        │
//! │      DrainController::request_drain() flush the previous session        │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  enqueue(name, payload)                                                 │
//! │      before_queue veto ► backend.store() ► queued ► request_drain()     │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  disconnect()                                                           │
//! │      drain.shutdown() ► wait idle ► backend.disconnect()                │
//! │      persisted items stay for the next session                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_core::validation::validate_item_name;
use courier_core::{BackendKind, Capabilities, DrainState, QueueKey};
use courier_store::{open_backend, QueueBackend, StoreConfig};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::UploaderConfig;
use crate::drain::{DrainController, DrainOutcome};
use crate::error::{SyncError, SyncResult};
use crate::events::{NoOpEmitter, QueueEventEmitter};
use crate::remote::{HttpUploader, RemoteUploader, RetryingUploader};
use crate::retry::RetryPolicy;

// =============================================================================
// Uploader Status
// =============================================================================

/// Snapshot of the facade for external queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploaderStatus {
    /// Engine in use, if connected.
    pub backend: Option<BackendKind>,

    /// Whether a backend is connected.
    pub is_connected: bool,

    /// False once a connect attempt failed or no engine is offered.
    pub offline_capable: bool,

    /// Drain controller state.
    pub drain_state: DrainState,

    /// Items waiting for delivery (None when not connected).
    pub pending: Option<u64>,
}

impl Default for UploaderStatus {
    fn default() -> Self {
        UploaderStatus {
            backend: None,
            is_connected: false,
            offline_capable: true,
            drain_state: DrainState::Idle,
            pending: None,
        }
    }
}

// =============================================================================
// Offline Uploader
// =============================================================================

/// A connected backend plus the drain loop bound to it.
struct Session {
    kind: BackendKind,
    backend: Arc<dyn QueueBackend>,
    drain: DrainController,
}

/// Durable upload queue facade.
pub struct OfflineUploader {
    store_config: StoreConfig,
    capabilities: Capabilities,
    uploader: Arc<RetryingUploader>,
    emitter: Arc<dyn QueueEventEmitter>,
    backend_override: Option<Arc<dyn QueueBackend>>,
    session: RwLock<Option<Session>>,
    /// Serializes connect and disconnect so a reconnect never opens the
    /// store while the previous session still holds it.
    lifecycle: Mutex<()>,
    offline_capable: AtomicBool,
}

impl OfflineUploader {
    /// Starts a builder.
    pub fn builder(store_config: StoreConfig) -> OfflineUploaderBuilder {
        OfflineUploaderBuilder::new(store_config)
    }

    /// Opens the preferred available backend and flushes leftovers.
    ///
    /// The backend choice is made once. A failed connect marks the facade
    /// as not offline-capable; it does not fall back to the other engine.
    /// Calling `connect` while connected returns the current engine.
    pub async fn connect(&self) -> SyncResult<BackendKind> {
        let _lifecycle = self.lifecycle.lock().await;
        let mut session = self.session.write().await;
        if let Some(current) = session.as_ref() {
            debug!(backend = %current.kind, "Already connected");
            return Ok(current.kind);
        }

        let backend = match &self.backend_override {
            Some(backend) => backend.clone(),
            None => match self.capabilities.select_backend() {
                Some(kind) => open_backend(kind, self.store_config.clone()),
                None => {
                    warn!("No persistence backend offered, offline queueing disabled");
                    self.offline_capable.store(false, Ordering::SeqCst);
                    return Err(SyncError::NoBackendAvailable);
                }
            },
        };
        let kind = backend.kind();

        info!(backend = %kind, "Connecting upload queue");
        let connection = match backend.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(backend = %kind, error = %e, "Backend connect failed, offline queueing disabled");
                self.offline_capable.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        self.offline_capable.store(true, Ordering::SeqCst);

        info!(
            backend = %kind,
            store = %connection.store_name,
            version = %connection.version,
            migrated = connection.migrated,
            "Upload queue connected"
        );

        let drain = DrainController::new(
            backend.clone(),
            self.uploader.clone(),
            self.emitter.clone(),
        );
        drain.request_drain();

        *session = Some(Session {
            kind,
            backend,
            drain,
        });
        Ok(kind)
    }

    /// Stops the drain loop and releases the backend. No-op when not connected.
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        let Some(session) = self.session.write().await.take() else {
            debug!("Disconnect without connection, ignoring");
            return;
        };

        session.drain.shutdown();
        session.drain.wait_idle().await;
        session.backend.disconnect().await;

        info!(backend = %session.kind, "Upload queue disconnected");
    }

    /// Durably queues one item and wakes the drain loop.
    ///
    /// ## Errors
    /// - `Unsupported` when no backend is connected
    /// - `Validation` for an empty or oversized name
    /// - `Rejected` when a `before_queue` listener vetoes the item
    /// - `Store` when the write transaction fails (nothing is queued)
    pub async fn enqueue(&self, name: &str, payload: &str) -> SyncResult<QueueKey> {
        let (backend, drain) = {
            let session = self.session.read().await;
            match session.as_ref() {
                Some(s) => (s.backend.clone(), s.drain.clone()),
                None => return Err(SyncError::Unsupported),
            }
        };

        if let Err(e) = validate_item_name(name) {
            let err = SyncError::from(e);
            self.emitter.queue_failed(name, &err);
            return Err(err);
        }

        if !self.emitter.before_queue(name) {
            debug!(name = %name, "Item vetoed before queueing");
            return Err(SyncError::Rejected {
                name: name.to_string(),
            });
        }

        match backend.store(name, payload).await {
            Ok(key) => {
                info!(key = %key, name = %name, "Item queued");
                self.emitter.queued(key, name);
                drain.request_drain();
                Ok(key)
            }
            Err(e) => {
                let err = SyncError::from(e);
                warn!(name = %name, error = %err, "Queueing failed");
                self.emitter.queue_failed(name, &err);
                Err(err)
            }
        }
    }

    /// Requests a drain cycle.
    ///
    /// Returns the cycle handle, or `None` when a cycle is already running.
    pub async fn drain(&self) -> SyncResult<Option<JoinHandle<DrainOutcome>>> {
        let session = self.session.read().await;
        match session.as_ref() {
            Some(s) => Ok(s.drain.request_drain()),
            None => Err(SyncError::Unsupported),
        }
    }

    /// Waits until the drain loop is idle. Returns immediately when not connected.
    pub async fn wait_idle(&self) {
        let drain = self.session.read().await.as_ref().map(|s| s.drain.clone());
        if let Some(drain) = drain {
            drain.wait_idle().await;
        }
    }

    /// Returns true if a backend is connected.
    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// False after a failed connect, so the host can fall back to direct uploads.
    pub fn is_offline_capable(&self) -> bool {
        self.offline_capable.load(Ordering::SeqCst)
    }

    /// Current status.
    pub async fn status(&self) -> UploaderStatus {
        let session = self.session.read().await;
        let Some(s) = session.as_ref() else {
            return UploaderStatus {
                offline_capable: self.is_offline_capable(),
                ..Default::default()
            };
        };

        let pending = match s.backend.len().await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Could not count pending items");
                None
            }
        };

        UploaderStatus {
            backend: Some(s.kind),
            is_connected: true,
            offline_capable: self.is_offline_capable(),
            drain_state: s.drain.state(),
            pending,
        }
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating an OfflineUploader with options.
pub struct OfflineUploaderBuilder {
    store_config: StoreConfig,
    capabilities: Capabilities,
    remote: Option<Arc<dyn RemoteUploader>>,
    policy: RetryPolicy,
    emitter: Option<Arc<dyn QueueEventEmitter>>,
    backend: Option<Arc<dyn QueueBackend>>,
}

impl OfflineUploaderBuilder {
    /// Creates a new builder for the given storage location.
    pub fn new(store_config: StoreConfig) -> Self {
        OfflineUploaderBuilder {
            store_config,
            capabilities: Capabilities::default(),
            remote: None,
            policy: RetryPolicy::default(),
            emitter: None,
            backend: None,
        }
    }

    /// Builder preloaded from an uploader configuration, with an HTTP uploader.
    pub fn from_config(config: &UploaderConfig) -> SyncResult<Self> {
        config.validate()?;
        let http = HttpUploader::from_config(config)?;

        Ok(Self::new(config.store_config())
            .with_capabilities(config.capabilities())
            .with_retry_policy(config.retry_policy())
            .with_uploader(Arc::new(http)))
    }

    /// Sets the capability descriptor.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the remote uploader.
    pub fn with_uploader(mut self, remote: Arc<dyn RemoteUploader>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sets the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the event emitter.
    pub fn with_emitter(mut self, emitter: Arc<dyn QueueEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Uses a prebuilt backend instead of selecting one from the capabilities.
    pub fn with_backend(mut self, backend: Arc<dyn QueueBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Builds the OfflineUploader.
    pub fn build(self) -> SyncResult<OfflineUploader> {
        let remote = self
            .remote
            .ok_or_else(|| SyncError::InvalidConfig("Remote uploader required".into()))?;

        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));
        let uploader = Arc::new(RetryingUploader::new(remote, self.policy, emitter.clone()));
        let offline_capable =
            self.backend.is_some() || self.capabilities.is_offline_capable();

        Ok(OfflineUploader {
            store_config: self.store_config,
            capabilities: self.capabilities,
            uploader,
            emitter,
            backend_override: self.backend,
            session: RwLock::new(None),
            lifecycle: Mutex::new(()),
            offline_capable: AtomicBool::new(offline_capable),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UploadError;
    use async_trait::async_trait;

    struct AlwaysOk;

    #[async_trait]
    impl RemoteUploader for AlwaysOk {
        async fn upload(&self, _name: &str, _payload: &str) -> Result<(), UploadError> {
            Ok(())
        }
    }

    struct VetoSecrets;

    impl QueueEventEmitter for VetoSecrets {
        fn before_queue(&self, name: &str) -> bool {
            !name.starts_with("secret")
        }
    }

    fn builder(dir: &tempfile::TempDir) -> OfflineUploaderBuilder {
        OfflineUploader::builder(StoreConfig::new(dir.path())).with_uploader(Arc::new(AlwaysOk))
    }

    #[test]
    fn test_status_default() {
        let status = UploaderStatus::default();
        assert!(!status.is_connected);
        assert!(status.backend.is_none());
        assert_eq!(status.drain_state, DrainState::Idle);
    }

    #[test]
    fn test_build_requires_uploader() {
        let dir = tempfile::tempdir().unwrap();
        let result = OfflineUploader::builder(StoreConfig::new(dir.path())).build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_enqueue_before_connect_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = builder(&dir).build().unwrap();

        let err = uploader.enqueue("a.txt", "AAAA").await.unwrap_err();
        assert!(matches!(err, SyncError::Unsupported));
        assert!(matches!(uploader.drain().await, Err(SyncError::Unsupported)));
    }

    #[tokio::test]
    async fn test_connect_prefers_object_store() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = builder(&dir).build().unwrap();

        assert_eq!(uploader.connect().await.unwrap(), BackendKind::ObjectStore);
        // Second connect keeps the same engine
        assert_eq!(uploader.connect().await.unwrap(), BackendKind::ObjectStore);
        uploader.disconnect().await;
    }

    #[tokio::test]
    async fn test_connect_uses_relational_when_only_option() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = builder(&dir)
            .with_capabilities(Capabilities::relational_only())
            .build()
            .unwrap();

        assert_eq!(uploader.connect().await.unwrap(), BackendKind::Relational);
        let status = uploader.status().await;
        assert_eq!(status.backend, Some(BackendKind::Relational));
        assert!(status.is_connected);
        uploader.disconnect().await;
    }

    #[tokio::test]
    async fn test_no_capabilities_disables_offline_mode() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = builder(&dir)
            .with_capabilities(Capabilities::none())
            .build()
            .unwrap();
        assert!(!uploader.is_offline_capable());

        assert!(matches!(
            uploader.connect().await,
            Err(SyncError::NoBackendAvailable)
        ));
        assert!(matches!(
            uploader.enqueue("a", "b").await,
            Err(SyncError::Unsupported)
        ));
    }

    #[tokio::test]
    async fn test_failed_connect_marks_not_offline_capable() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = OfflineUploader::builder(StoreConfig::new(dir.path()).store_name("bad name"))
            .with_uploader(Arc::new(AlwaysOk))
            .build()
            .unwrap();
        assert!(uploader.is_offline_capable());

        assert!(uploader.connect().await.is_err());
        assert!(!uploader.is_offline_capable());
        assert!(!uploader.is_connected().await);
    }

    #[tokio::test]
    async fn test_before_queue_veto() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = builder(&dir)
            .with_emitter(Arc::new(VetoSecrets))
            .build()
            .unwrap();
        uploader.connect().await.unwrap();

        let err = uploader.enqueue("secret.key", "x").await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected { .. }));
        assert_eq!(uploader.status().await.pending, Some(0));

        uploader.enqueue("public.txt", "x").await.unwrap();
        uploader.wait_idle().await;
        uploader.disconnect().await;
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = builder(&dir).build().unwrap();
        uploader.connect().await.unwrap();

        assert!(matches!(
            uploader.enqueue("  ", "x").await,
            Err(SyncError::Validation(_))
        ));
        uploader.disconnect().await;
    }

    /// Acknowledges after a delay, keeping a drain cycle busy.
    struct SlowOk;

    #[async_trait]
    impl RemoteUploader for SlowOk {
        async fn upload(&self, _name: &str, _payload: &str) -> Result<(), UploadError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reconnect_during_disconnect_waits_for_release() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = OfflineUploader::builder(StoreConfig::new(dir.path()))
            .with_capabilities(Capabilities::object_only())
            .with_uploader(Arc::new(SlowOk))
            .build()
            .unwrap();
        uploader.connect().await.unwrap();
        uploader.enqueue("a.txt", "AAAA").await.unwrap();

        let ((), reconnected) = tokio::join!(uploader.disconnect(), async {
            tokio::task::yield_now().await;
            uploader.connect().await
        });

        assert_eq!(reconnected.unwrap(), BackendKind::ObjectStore);
        assert!(uploader.is_offline_capable());
        assert!(uploader.is_connected().await);
        uploader.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = builder(&dir).build().unwrap();

        uploader.disconnect().await;
        uploader.connect().await.unwrap();
        uploader.disconnect().await;
        uploader.disconnect().await;
        assert!(!uploader.is_connected().await);
    }
}

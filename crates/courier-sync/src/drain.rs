//! # Queue Drain Controller
//!
//! Delivers queued items oldest first, deleting each only after the endpoint
//! acknowledged it.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────┐   request_drain()    ┌──────────┐                            │
//! │   │ Idle │ ───────────────────► │ Draining │ ◄──┐                       │
//! │   └──────┘                      └────┬─────┘    │                       │
//! │      ▲                               │          │ delete ok             │
//! │      │                               ▼          │                       │
//! │      │                        peek_oldest()     │                       │
//! │      │                          │        │      │                       │
//! │      │      none, no re-run     │        │ item │                       │
//! │      └──────────────────────────┘        ▼      │                       │
//! │      │                           deliver(item) ─┘                       │
//! │      │                                                                  │
//! │      │  peek / delete error, policy gave up, shutdown                  │
//! │      └──────────────────────────────────────────                       │
//! │                                                                         │
//! │  request_drain() while Draining: coalesced. The running cycle is       │
//! │  marked to peek once more before it goes idle.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The Idle/Draining flag lives in a `watch` channel. Both the start check
//! and the final "go idle unless a re-run was requested" check run inside
//! `send_if_modified`, under the channel lock, so a request can never fall
//! between a cycle's last empty peek and its transition to Idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use courier_core::DrainState;
use courier_store::QueueBackend;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::SyncError;
use crate::events::QueueEventEmitter;
use crate::remote::RetryingUploader;

/// How a drain cycle ended.
#[derive(Debug)]
pub enum DrainOutcome {
    /// The store was found empty.
    Drained { delivered: u64 },
    /// A backend step failed or the retry policy gave up. The head item
    /// stays queued for the next cycle.
    Halted { delivered: u64, error: SyncError },
    /// The controller was shut down mid-cycle.
    Cancelled { delivered: u64 },
}

impl DrainOutcome {
    /// Items delivered and deleted during the cycle.
    pub fn delivered(&self) -> u64 {
        match self {
            DrainOutcome::Drained { delivered }
            | DrainOutcome::Halted { delivered, .. }
            | DrainOutcome::Cancelled { delivered } => *delivered,
        }
    }

    /// Returns true if the cycle emptied the store.
    pub fn is_drained(&self) -> bool {
        matches!(self, DrainOutcome::Drained { .. })
    }
}

struct DrainInner {
    backend: Arc<dyn QueueBackend>,
    uploader: Arc<RetryingUploader>,
    emitter: Arc<dyn QueueEventEmitter>,
    state: watch::Sender<DrainState>,
    rerun: AtomicBool,
    shutdown: watch::Sender<bool>,
}

/// Single-flight drain loop over one backend.
#[derive(Clone)]
pub struct DrainController {
    inner: Arc<DrainInner>,
}

impl DrainController {
    /// Creates an idle controller.
    pub fn new(
        backend: Arc<dyn QueueBackend>,
        uploader: Arc<RetryingUploader>,
        emitter: Arc<dyn QueueEventEmitter>,
    ) -> Self {
        let (state, _) = watch::channel(DrainState::Idle);
        let (shutdown, _) = watch::channel(false);

        DrainController {
            inner: Arc::new(DrainInner {
                backend,
                uploader,
                emitter,
                state,
                rerun: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> DrainState {
        *self.inner.state.borrow()
    }

    /// Starts a drain cycle unless one is already running.
    ///
    /// Returns the cycle's handle when a new cycle was started, `None` when
    /// the request was coalesced into the running cycle or the controller
    /// has been shut down.
    pub fn request_drain(&self) -> Option<JoinHandle<DrainOutcome>> {
        if *self.inner.shutdown.borrow() {
            debug!("Drain requested after shutdown, ignoring");
            return None;
        }

        let inner = &self.inner;
        let started = inner.state.send_if_modified(|state| match state {
            DrainState::Idle => {
                *state = DrainState::Draining;
                true
            }
            DrainState::Draining => {
                inner.rerun.store(true, Ordering::SeqCst);
                false
            }
        });

        if !started {
            debug!("Drain already running, request coalesced");
            return None;
        }

        let inner = self.inner.clone();
        Some(tokio::spawn(inner.run()))
    }

    /// Waits until no cycle is running.
    pub async fn wait_idle(&self) {
        let mut state = self.inner.state.subscribe();
        // The sender lives in `inner`, so the channel cannot close here
        let _ = state.wait_for(DrainState::is_idle).await;
    }

    /// Stops the running cycle at its next step and refuses new ones.
    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }
}

/// Puts the controller back to Idle if a cycle is dropped before it
/// returned, which is what happens when the task panics.
struct CycleGuard {
    inner: Arc<DrainInner>,
    armed: bool,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        if self.armed {
            error!("Drain cycle aborted, resetting to idle");
            self.inner.state.send_modify(|state| {
                self.inner.rerun.store(false, Ordering::SeqCst);
                *state = DrainState::Idle;
            });
        }
    }
}

impl DrainInner {
    async fn run(self: Arc<Self>) -> DrainOutcome {
        let mut guard = CycleGuard {
            inner: self.clone(),
            armed: true,
        };
        let outcome = self.cycle().await;
        guard.armed = false;
        outcome
    }

    async fn cycle(&self) -> DrainOutcome {
        let mut shutdown = self.shutdown.subscribe();
        let mut delivered = 0u64;

        info!("Drain cycle started");

        loop {
            if *shutdown.borrow() {
                return self.stop(DrainOutcome::Cancelled { delivered });
            }

            let item = match self.backend.peek_oldest().await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    if self.finish_if_no_rerun() {
                        info!(delivered, "Queue drained");
                        self.emitter.queue_empty();
                        return DrainOutcome::Drained { delivered };
                    }
                    debug!("Drain re-run requested, peeking again");
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "Peek failed, halting drain cycle");
                    return self.stop(DrainOutcome::Halted {
                        delivered,
                        error: e.into(),
                    });
                }
            };

            debug!(key = %item.key, name = %item.name, "Delivering head item");
            self.emitter.uploading(&item.name);

            let result = tokio::select! {
                result = self.uploader.deliver(&item.name, &item.payload) => result,
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!(key = %item.key, "Drain cancelled during upload");
                    return self.stop(DrainOutcome::Cancelled { delivered });
                }
            };

            if let Err(e) = result {
                error!(key = %item.key, error = %e, "Delivery abandoned, halting drain cycle");
                return self.stop(DrainOutcome::Halted {
                    delivered,
                    error: e.into(),
                });
            }

            // Delete only after the endpoint acknowledged the item
            if let Err(e) = self.backend.delete(item.key).await {
                error!(key = %item.key, error = %e, "Delete failed, halting drain cycle");
                return self.stop(DrainOutcome::Halted {
                    delivered,
                    error: e.into(),
                });
            }

            delivered += 1;
            debug!(key = %item.key, delivered, "Item delivered and removed");
        }
    }

    /// Goes idle unless a coalesced request arrived. Returns true if idle.
    fn finish_if_no_rerun(&self) -> bool {
        self.state.send_if_modified(|state| {
            if self.rerun.swap(false, Ordering::SeqCst) {
                false
            } else {
                *state = DrainState::Idle;
                true
            }
        })
    }

    /// Forces Idle and drops pending re-runs.
    fn stop(&self, outcome: DrainOutcome) -> DrainOutcome {
        self.state.send_modify(|state| {
            self.rerun.store(false, Ordering::SeqCst);
            *state = DrainState::Idle;
        });
        outcome
    }
}

//! # Remote Uploader
//!
//! Sends one named payload to the remote endpoint.
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  RetryingUploader::deliver(name, payload)                               │
//! │     │                                                                   │
//! │     │  loop {                                                           │
//! │     │     RemoteUploader::upload()   ── one attempt                    │
//! │     │     Ok   → emit upload_succeeded, return                          │
//! │     │     Err  → emit upload_failed, sleep(policy delay), retry        │
//! │     │  }                                                                │
//! │     ▼                                                                   │
//! │  HttpUploader::upload(name, payload)                                    │
//! │     POST <url>                                                          │
//! │     x-requested-with: XMLHttpRequest                                    │
//! │     content-type: application/x-www-form-urlencoded                     │
//! │     name=<name>&data=<payload>                                          │
//! │                                                                         │
//! │     2xx → Ok      anything else → UploadError (retryable)              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::UploaderConfig;
use crate::error::{SyncResult, UploadError};
use crate::events::QueueEventEmitter;
use crate::retry::RetryPolicy;

/// A single delivery attempt to the remote endpoint.
///
/// Implementations own no queue state and never retry on their own.
#[async_trait]
pub trait RemoteUploader: Send + Sync {
    /// Sends one item. `Ok` only for a response in the success class.
    async fn upload(&self, name: &str, payload: &str) -> Result<(), UploadError>;
}

// =============================================================================
// HTTP Uploader
// =============================================================================

/// Form-encoded HTTP POST uploader.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    url: url::Url,
}

impl HttpUploader {
    /// Creates an uploader for the given endpoint.
    pub fn new(
        url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> SyncResult<Self> {
        let url = url::Url::parse(url)?;
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(HttpUploader { client, url })
    }

    /// Creates an uploader from the `[endpoint]` section.
    pub fn from_config(config: &UploaderConfig) -> SyncResult<Self> {
        Self::new(
            &config.endpoint.url,
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    /// The endpoint URL.
    pub fn url(&self) -> &url::Url {
        &self.url
    }
}

#[async_trait]
impl RemoteUploader for HttpUploader {
    async fn upload(&self, name: &str, payload: &str) -> Result<(), UploadError> {
        debug!(url = %self.url, name = %name, bytes = payload.len(), "Sending upload request");

        let response = self
            .client
            .post(self.url.clone())
            .header("x-requested-with", "XMLHttpRequest")
            .form(&[("name", name), ("data", payload)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(UploadError::Status(status.as_u16()))
        }
    }
}

// =============================================================================
// Retrying Uploader
// =============================================================================

/// Wraps a [`RemoteUploader`] with a [`RetryPolicy`].
///
/// Each failed attempt is reported once through the emitter before the
/// silent wait; the eventual success is reported once.
pub struct RetryingUploader {
    remote: Arc<dyn RemoteUploader>,
    policy: RetryPolicy,
    emitter: Arc<dyn QueueEventEmitter>,
}

impl RetryingUploader {
    /// Creates a retrying uploader.
    pub fn new(
        remote: Arc<dyn RemoteUploader>,
        policy: RetryPolicy,
        emitter: Arc<dyn QueueEventEmitter>,
    ) -> Self {
        RetryingUploader {
            remote,
            policy,
            emitter,
        }
    }

    /// Delivers one item, retrying until success or until the policy gives up.
    ///
    /// Dropping the returned future between attempts cancels the retry.
    pub async fn deliver(&self, name: &str, payload: &str) -> Result<(), UploadError> {
        let mut schedule = self.policy.schedule();

        loop {
            match self.remote.upload(name, payload).await {
                Ok(()) => {
                    info!(name = %name, retries = schedule.failures(), "Upload succeeded");
                    self.emitter.upload_succeeded(name);
                    return Ok(());
                }
                Err(e) => {
                    self.emitter.upload_failed(name, &e);

                    match schedule.next_delay() {
                        Some(delay) => {
                            warn!(
                                name = %name,
                                error = %e,
                                attempt = schedule.failures(),
                                ?delay,
                                "Upload failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            warn!(name = %name, error = %e, "Upload retries exhausted");
                            return Err(UploadError::GaveUp {
                                attempts: schedule.failures(),
                            });
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` attempts, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl RemoteUploader for Flaky {
        async fn upload(&self, _name: &str, _payload: &str) -> Result<(), UploadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(UploadError::Status(500))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl QueueEventEmitter for Recorder {
        fn upload_succeeded(&self, name: &str) {
            self.0.lock().unwrap().push(format!("ok:{}", name));
        }

        fn upload_failed(&self, name: &str, error: &UploadError) {
            self.0.lock().unwrap().push(format!("fail:{}:{}", name, error));
        }
    }

    fn retrying(failures: u32, policy: RetryPolicy) -> (RetryingUploader, Arc<Flaky>, Arc<Recorder>) {
        let remote = Arc::new(Flaky {
            failures,
            calls: AtomicU32::new(0),
        });
        let recorder = Arc::new(Recorder::default());
        let uploader = RetryingUploader::new(remote.clone(), policy, recorder.clone());
        (uploader, remote, recorder)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_then_success() {
        let (uploader, remote, recorder) = retrying(1, RetryPolicy::default());

        let started = tokio::time::Instant::now();
        uploader.deliver("b.txt", "BBBB").await.unwrap();

        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                "fail:b.txt:Endpoint returned status 500".to_string(),
                "ok:b.txt".to_string()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_policy_keeps_retrying() {
        let (uploader, remote, _) = retrying(50, RetryPolicy::default());

        uploader.deliver("x", "1").await.unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 51);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_gives_up() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1)).with_max_attempts(3);
        let (uploader, remote, recorder) = retrying(10, policy);

        let err = uploader.deliver("x", "1").await.unwrap_err();
        assert_eq!(err, UploadError::GaveUp { attempts: 3 });
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.0.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_http_uploader_rejects_bad_url() {
        let result = HttpUploader::new("::not a url", Duration::from_secs(1), Duration::from_secs(1));
        assert!(result.is_err());
    }
}

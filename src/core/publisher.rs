// src/core/publisher.rs

//! Delivery of findings to the message bus.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::error::ScanError;
use crate::core::models::FindingRecord;

pub const DEFAULT_SUBJECT: &str = "scans";

#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus client could not hand the message to the broker. Worth retrying.
    #[error("bus transport error: {0}")]
    Transport(String),
}

/// The message-bus capability the engine depends on.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), PublishError>;
}

// --- NATS ---

/// Publisher backed by a single shared NATS connection.
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    /// Connects once at start-up. The client keeps reconnecting in the background,
    /// so a broker that is down at boot does not stop the service.
    pub async fn connect(url: &str, name: &str) -> Result<Self, async_nats::ConnectError> {
        let client = async_nats::ConnectOptions::new()
            .name(name)
            .retry_on_initial_connect()
            .connect(url)
            .await?;
        info!(url, name, "NATS client ready.");
        Ok(Self { client })
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), PublishError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))
    }
}

// --- In memoria ---
// In-memory recorder

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Bytes,
}

/// Keeps every published message in memory. Used by tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), PublishError> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| PublishError::Transport("recorder lock poisoned".into()))?;
        messages.push(PublishedMessage { subject: subject.to_string(), payload });
        Ok(())
    }
}

// --- Retry ---

/// Exponential backoff applied to transient publish failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    fn next_delay(&self, delay: Duration) -> Duration {
        let scaled = Duration::from_millis((delay.as_millis() as f64 * self.backoff_multiplier) as u64);
        scaled.min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    pub subject: String,
    /// Upper bound on one attempt. A disconnected client buffers and waits for the
    /// broker, so an attempt that runs past this counts as failed.
    pub attempt_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            attempt_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Serialises findings and hands them to the bus with bounded retries.
pub struct FindingPublisher {
    inner: Arc<dyn Publisher>,
    config: PublisherConfig,
}

impl FindingPublisher {
    pub fn new(inner: Arc<dyn Publisher>, config: PublisherConfig) -> Self {
        Self { inner, config }
    }

    /// Publishes one record. After the retries are spent the failure is returned as
    /// `ScanError::PublishFailure`; it is never allowed to take the process down.
    pub async fn publish(&self, record: &FindingRecord) -> Result<(), ScanError> {
        let payload = serde_json::to_vec(record)
            .map(Bytes::from)
            .map_err(|e| ScanError::Internal(format!("failed to serialise finding: {e}")))?;

        let retry = &self.config.retry;
        let mut delay = retry.initial_delay;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let attempt = tokio::time::timeout(
                self.config.attempt_timeout,
                self.inner.publish(&self.config.subject, payload.clone()),
            )
            .await
            .unwrap_or_else(|_| {
                Err(PublishError::Transport(format!(
                    "no broker acknowledgement within {}ms",
                    self.config.attempt_timeout.as_millis()
                )))
            });
            match attempt {
                Ok(()) => {
                    debug!(domain = %record.domain, subject = %self.config.subject, attempts, "Finding published.");
                    return Ok(());
                }
                Err(e) if attempts > retry.max_retries => {
                    error!(domain = %record.domain, attempts, error = %e, "Giving up on publishing finding.");
                    return Err(ScanError::PublishFailure { attempts, message: e.to_string() });
                }
                Err(e) => {
                    warn!(
                        domain = %record.domain,
                        attempt = attempts,
                        max_retries = retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Publish failed, retrying with backoff."
                    );
                    tokio::time::sleep(delay).await;
                    delay = retry.next_delay(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{Finding, ImplementationFinding, ImplementationStatus};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then accepts.
    struct FlakyPublisher {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Publisher for FlakyPublisher {
        async fn publish(&self, _subject: &str, _payload: Bytes) -> Result<(), PublishError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(PublishError::Transport("broker unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn quick_config(max_retries: u32) -> PublisherConfig {
        PublisherConfig {
            subject: DEFAULT_SUBJECT.to_string(),
            attempt_timeout: Duration::from_millis(20),
            retry: RetryPolicy {
                max_retries,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
                backoff_multiplier: 2.0,
            },
        }
    }

    fn record() -> FindingRecord {
        FindingRecord::new(
            "example.com",
            Finding::Implementation(ImplementationFinding { status: ImplementationStatus::ValidHttps }),
        )
    }

    #[tokio::test]
    async fn gives_up_after_configured_retries() {
        let flaky = Arc::new(FlakyPublisher { failures: u32::MAX, calls: AtomicU32::new(0) });
        let publisher = FindingPublisher::new(flaky.clone(), quick_config(3));

        let err = publisher.publish(&record()).await.unwrap_err();
        match err {
            ScanError::PublishFailure { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error: {other:?}"),
        }
        // One initial attempt plus exactly three retries.
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let flaky = Arc::new(FlakyPublisher { failures: 2, calls: AtomicU32::new(0) });
        let publisher = FindingPublisher::new(flaky.clone(), quick_config(3));

        publisher.publish(&record()).await.unwrap();
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    /// Accepts the message and never acknowledges it, like a client waiting on a reconnect.
    struct StalledPublisher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Publisher for StalledPublisher {
        async fn publish(&self, _subject: &str, _payload: Bytes) -> Result<(), PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_attempts_time_out_and_are_retried() {
        let stalled = Arc::new(StalledPublisher { calls: AtomicU32::new(0) });
        let publisher = FindingPublisher::new(stalled.clone(), quick_config(2));

        let err = publisher.publish(&record()).await.unwrap_err();
        match err {
            ScanError::PublishFailure { attempts, message } => {
                assert_eq!(attempts, 3);
                assert!(message.contains("acknowledgement"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stalled.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_a_single_attempt() {
        let flaky = Arc::new(FlakyPublisher { failures: 1, calls: AtomicU32::new(0) });
        let publisher = FindingPublisher::new(flaky.clone(), quick_config(0));

        assert!(publisher.publish(&record()).await.is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memory_publisher_records_json_on_subject() {
        let memory = Arc::new(MemoryPublisher::new());
        let publisher = FindingPublisher::new(memory.clone(), PublisherConfig::default());
        publisher.publish(&record()).await.unwrap();

        let messages = memory.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject, "scans");
        let value: serde_json::Value = serde_json::from_slice(&messages[0].payload).unwrap();
        assert_eq!(value["checkType"], "implementation");
        assert_eq!(value["status"], "ValidHttps");
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.next_delay(Duration::from_millis(100)), Duration::from_millis(200));
        assert_eq!(policy.next_delay(Duration::from_millis(200)), Duration::from_millis(250));
    }
}

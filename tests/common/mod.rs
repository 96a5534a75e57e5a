// tests/common/mod.rs

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use url::Url;

use https_posture_scanner::core::models::{Certificate, FailureKind, HttpObservation, ProbeFailure, TlsObservation};
use https_posture_scanner::core::publisher::{FindingPublisher, MemoryPublisher, PublisherConfig, RetryPolicy};
use https_posture_scanner::core::scanner::probe::{HttpProber, TlsProber};
use https_posture_scanner::core::scanner::{Engine, EngineConfig, Scanner};

/// Returns the same observation for every dial, optionally after a delay.
pub struct FakeTlsProber {
    observation: TlsObservation,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeTlsProber {
    pub fn new(observation: TlsObservation) -> Self {
        Self { observation, delay: None, calls: AtomicUsize::new(0) }
    }

    pub fn slow(observation: TlsObservation, delay: Duration) -> Self {
        Self { observation, delay: Some(delay), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TlsProber for FakeTlsProber {
    async fn probe_tls(&self, _domain: &str) -> TlsObservation {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.observation.clone()
    }
}

/// Answers by URL prefix (`http://` or `https://`) from a fixed table.
pub struct FakeHttpProber {
    responses: HashMap<&'static str, Result<HttpObservation, ProbeFailure>>,
    calls: AtomicUsize,
}

impl FakeHttpProber {
    pub fn new(
        plaintext: Result<HttpObservation, ProbeFailure>,
        secure: Result<HttpObservation, ProbeFailure>,
    ) -> Self {
        let responses = HashMap::from([("http", plaintext), ("https", secure)]);
        Self { responses, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpProber for FakeHttpProber {
    async fn fetch(&self, url: &str) -> Result<HttpObservation, ProbeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scheme = if url.starts_with("https://") { "https" } else { "http" };
        self.responses
            .get(scheme)
            .cloned()
            .unwrap_or_else(|| Err(ProbeFailure::new(FailureKind::Other, "unscripted scheme")))
    }
}

// --- Fixtures ---

pub fn cert(subject: &str, issuer: &str, days_left: i64) -> Certificate {
    let now = Utc::now();
    Certificate {
        subject_common_name: subject.to_string(),
        issuer_common_name: issuer.to_string(),
        not_before: now - ChronoDuration::days(30),
        not_after: now + ChronoDuration::days(days_left),
    }
}

/// A modern, trusted TLS 1.3 session with a two-certificate chain.
pub fn healthy_tls() -> TlsObservation {
    TlsObservation {
        negotiated_version: Some(0x0304),
        negotiated_cipher_suite: Some("TLS_AES_256_GCM_SHA384".to_string()),
        peer_certificate_chain: vec![cert("example.com", "Example CA", 60), cert("Example CA", "Example Root", 900)],
        chain_parse_failures: 0,
        chain_trusted: Some(true),
        dial_succeeded: true,
        failure: None,
    }
}

pub fn failed_tls(kind: FailureKind) -> TlsObservation {
    TlsObservation::failed(ProbeFailure::new(kind, "scripted failure"))
}

pub fn landed_on(url: &str, hsts: Option<&str>) -> Result<HttpObservation, ProbeFailure> {
    Ok(HttpObservation {
        final_url: Url::parse(url).unwrap(),
        status: 200,
        hsts_header: hsts.map(str::to_string),
    })
}

pub fn http_failure(kind: FailureKind) -> Result<HttpObservation, ProbeFailure> {
    Err(ProbeFailure::new(kind, "scripted failure"))
}

pub fn healthy_http() -> FakeHttpProber {
    FakeHttpProber::new(
        landed_on("https://example.com/", Some("max-age=63072000; includeSubDomains; preload")),
        landed_on("https://example.com/", Some("max-age=63072000; includeSubDomains; preload")),
    )
}

pub fn quick_publisher_config() -> PublisherConfig {
    PublisherConfig {
        attempt_timeout: Duration::from_millis(50),
        retry: RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        },
        ..PublisherConfig::default()
    }
}

/// Everything a test needs to drive a `Scanner` and inspect what it did.
pub struct Harness {
    pub scanner: Arc<Scanner>,
    pub tls: Arc<FakeTlsProber>,
    pub http: Arc<FakeHttpProber>,
    pub bus: Arc<MemoryPublisher>,
}

pub fn harness(tls: FakeTlsProber, http: FakeHttpProber, config: EngineConfig) -> Harness {
    let tls = Arc::new(tls);
    let http = Arc::new(http);
    let bus = Arc::new(MemoryPublisher::new());
    let engine = Engine::with_probers(tls.clone(), http.clone(), config);
    let publisher = FindingPublisher::new(bus.clone(), quick_publisher_config());
    Harness { scanner: Arc::new(Scanner::new(engine, publisher)), tls, http, bus }
}

pub fn default_harness() -> Harness {
    harness(FakeTlsProber::new(healthy_tls()), healthy_http(), EngineConfig::default())
}

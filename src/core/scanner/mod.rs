// src/core/scanner/mod.rs

// This file acts as the public interface for the `scanner` module.
// Each check lives in its own sub-module; the `Engine` below is the single
// dispatcher that runs them.
pub mod enforcement_scanner;
pub mod headers_scanner;
pub mod probe;
pub mod ssl_scanner;
pub mod tls_scanner;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use strum::IntoEnumIterator;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::core::error::ScanError;
use crate::core::knowledge_base::finding_code;
use crate::core::models::{CheckKind, Finding, FindingRecord, ScanRequest};
use crate::core::publisher::FindingPublisher;
use crate::core::validator::validate_request;
use self::probe::{HttpProber, OpensslProber, ProbeSetupError, ProbeTimeouts, ReqwestProber, TlsProber};

/// Settings the engine is constructed with. Nothing is read from the environment here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub probe_timeouts: ProbeTimeouts,
    /// Upper bound on a whole check, across all of its outbound calls.
    pub scan_deadline: Duration,
    /// Count a chain that does not verify against the system trust store as a bad chain.
    pub require_trusted_root: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeouts: ProbeTimeouts::default(),
            scan_deadline: Duration::from_secs(25),
            require_trusted_root: true,
        }
    }
}

/// Runs one check of any kind against a validated domain.
pub struct Engine {
    tls: Arc<dyn TlsProber>,
    http: Arc<dyn HttpProber>,
    config: EngineConfig,
}

impl Engine {
    /// Builds an engine with the real OpenSSL and reqwest probers.
    pub fn new(config: EngineConfig) -> Result<Self, ProbeSetupError> {
        let tls = OpensslProber::new(config.probe_timeouts)?;
        let http = ReqwestProber::new(config.probe_timeouts)?;
        Ok(Self::with_probers(Arc::new(tls), Arc::new(http), config))
    }

    pub fn with_probers(tls: Arc<dyn TlsProber>, http: Arc<dyn HttpProber>, config: EngineConfig) -> Self {
        Self { tls, http, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs `kind` against the request's domain under the scan deadline.
    ///
    /// # Returns
    /// The finding stamped with domain and completion time, or the reason no finding
    /// could be produced. Never both.
    pub async fn run_check(&self, kind: CheckKind, request: &ScanRequest) -> Result<FindingRecord, ScanError> {
        let domain = request.domain();
        let finding = timeout(self.config.scan_deadline, self.classify(kind, domain))
            .await
            .map_err(|_| {
                warn!(domain, check = %kind, deadline_ms = self.config.scan_deadline.as_millis() as u64, "Check exceeded its deadline.");
                ScanError::ProbeTimeout(format!(
                    "{kind} check exceeded its {}ms deadline",
                    self.config.scan_deadline.as_millis()
                ))
            })??;
        Ok(FindingRecord::new(domain, finding))
    }

    async fn classify(&self, kind: CheckKind, domain: &str) -> Result<Finding, ScanError> {
        match kind {
            CheckKind::Certificate => {
                ssl_scanner::run_certificate_check(self.tls.as_ref(), domain, self.config.require_trusted_root)
                    .await
                    .map(Finding::Certificate)
            }
            CheckKind::TlsVersion => tls_scanner::run_version_check(self.tls.as_ref(), domain)
                .await
                .map(Finding::TlsVersion),
            CheckKind::Cipher => tls_scanner::run_cipher_check(self.tls.as_ref(), domain)
                .await
                .map(Finding::Cipher),
            CheckKind::Hsts => headers_scanner::run_hsts_check(self.http.as_ref(), domain)
                .await
                .map(Finding::Hsts),
            CheckKind::Enforcement => enforcement_scanner::run_enforcement_check(self.http.as_ref(), domain)
                .await
                .map(Finding::Enforcement),
            CheckKind::Implementation => enforcement_scanner::run_implementation_check(self.http.as_ref(), domain)
                .await
                .map(Finding::Implementation),
        }
    }
}

/// Validation, classification and delivery for inbound scan requests.
pub struct Scanner {
    engine: Engine,
    publisher: FindingPublisher,
}

impl Scanner {
    pub fn new(engine: Engine, publisher: FindingPublisher) -> Self {
        Self { engine, publisher }
    }

    /// Validates `payload`, runs one check and publishes the result.
    ///
    /// The caller gets the published record or a structured error. Invalid input is
    /// rejected before any probe runs, and nothing is published on failure.
    pub async fn scan(&self, kind: CheckKind, payload: &Value) -> Result<FindingRecord, ScanError> {
        let request = validate_request(payload)?;
        self.scan_request(kind, &request).await
    }

    pub async fn scan_request(&self, kind: CheckKind, request: &ScanRequest) -> Result<FindingRecord, ScanError> {
        info!(domain = request.domain(), check = %kind, "Scan requested.");
        let record = match self.engine.run_check(kind, request).await {
            Ok(record) => record,
            Err(e) => {
                warn!(domain = request.domain(), check = %kind, error = %e, "Check did not produce a finding.");
                return Err(e);
            }
        };
        self.publisher.publish(&record).await?;
        info!(
            domain = request.domain(),
            check = %kind,
            outcome = finding_code(&record.finding),
            "Scan completed and published."
        );
        Ok(record)
    }

    /// Runs every check concurrently against one domain.
    ///
    /// Each check is independent: one outcome per `CheckKind`, in declaration order.
    pub async fn scan_all(&self, payload: &Value) -> Result<Vec<(CheckKind, Result<FindingRecord, ScanError>)>, ScanError> {
        let request = validate_request(payload)?;
        let request = &request;

        let (certificate, enforcement, hsts, implementation, tls_version, cipher) = tokio::join!(
            self.scan_request(CheckKind::Certificate, request),
            self.scan_request(CheckKind::Enforcement, request),
            self.scan_request(CheckKind::Hsts, request),
            self.scan_request(CheckKind::Implementation, request),
            self.scan_request(CheckKind::TlsVersion, request),
            self.scan_request(CheckKind::Cipher, request),
        );
        let outcomes = vec![certificate, enforcement, hsts, implementation, tls_version, cipher];

        Ok(CheckKind::iter().zip(outcomes).collect())
    }
}

// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use url::Url;

// --- Richieste ---
// Requests

/// A validated scan target. Only the domain validator can build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRequest {
    domain: String,
}

impl ScanRequest {
    pub(crate) fn new(domain: String) -> Self {
        Self { domain }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// The kinds of check the engine can run. Each one produces exactly one `Finding` variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CheckKind {
    Certificate,
    Enforcement,
    Hsts,
    Implementation,
    TlsVersion,
    Cipher,
}

// --- Osservazioni di connessione ---
// Connection observations

/// Why a probe could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum FailureKind {
    /// The port actively refused the connection.
    Refused,
    Dns,
    Timeout,
    /// TCP was fine but no TLS session could be negotiated.
    Tls,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ProbeFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// True when the failure itself proves the server does not offer TLS on the port.
    pub fn tls_not_offered(&self) -> bool {
        matches!(self.kind, FailureKind::Refused | FailureKind::Tls)
    }
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One element of the peer certificate chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub subject_common_name: String,
    pub issuer_common_name: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// What a single TLS dial saw. Never outlives the check that requested it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TlsObservation {
    /// Wire protocol version, e.g. `0x0303` for TLS 1.2.
    pub negotiated_version: Option<u16>,
    pub negotiated_cipher_suite: Option<String>,
    /// Leaf first, as sent by the server.
    pub peer_certificate_chain: Vec<Certificate>,
    /// Chain members the server sent that could not be decoded.
    pub chain_parse_failures: usize,
    /// Result of verifying the chain against the system trust store, when it was computed.
    pub chain_trusted: Option<bool>,
    pub dial_succeeded: bool,
    pub failure: Option<ProbeFailure>,
}

impl TlsObservation {
    pub fn failed(failure: ProbeFailure) -> Self {
        Self {
            dial_succeeded: false,
            failure: Some(failure),
            ..Default::default()
        }
    }
}

/// Result of a GET once all redirects have been followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpObservation {
    pub final_url: Url,
    pub status: u16,
    pub hsts_header: Option<String>,
}

impl HttpObservation {
    pub fn resolved_to_https(&self) -> bool {
        self.final_url.scheme() == "https"
    }
}

// --- Risultati delle verifiche ---
// Findings

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFinding {
    #[serde(rename = "certExpired")]
    pub expired: bool,
    #[serde(rename = "certSelfSigned")]
    pub self_signed: bool,
    #[serde(rename = "certBadChain")]
    pub bad_chain: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum EnforcementLevel {
    Strict,
    Moderate,
    NotEnforced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementFinding {
    pub level: EnforcementLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum HstsStatus {
    NoHsts,
    MaxAgeTooShort,
    NotIncludingSubDomains,
    ValidNotPreloaded,
    FullyImplemented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HstsFinding {
    pub status: HstsStatus,
    pub preloaded: bool,
    pub max_age_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ImplementationStatus {
    NoHttps,
    DowngradesHttps,
    ValidHttps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationFinding {
    pub status: ImplementationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum TlsVersionLabel {
    #[serde(rename = "SSL3.0")]
    #[strum(serialize = "SSL3.0")]
    Ssl30,
    #[serde(rename = "TLS1.0")]
    #[strum(serialize = "TLS1.0")]
    Tls10,
    #[serde(rename = "TLS1.1")]
    #[strum(serialize = "TLS1.1")]
    Tls11,
    #[serde(rename = "TLS1.2")]
    #[strum(serialize = "TLS1.2")]
    Tls12,
    #[serde(rename = "TLS1.3")]
    #[strum(serialize = "TLS1.3")]
    Tls13,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsVersionFinding {
    pub label: TlsVersionLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CipherTier {
    Strong,
    Acceptable,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedCipher {
    pub suite: String,
    pub tier: CipherTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherFinding {
    pub used: Option<UsedCipher>,
    pub strong_ciphers: Vec<String>,
    pub acceptable_ciphers: Vec<String>,
    pub weak_ciphers: Vec<String>,
}

/// One classification result, tagged on the wire by `checkType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "checkType", rename_all = "camelCase")]
pub enum Finding {
    Certificate(CertificateFinding),
    Enforcement(EnforcementFinding),
    Hsts(HstsFinding),
    Implementation(ImplementationFinding),
    TlsVersion(TlsVersionFinding),
    Cipher(CipherFinding),
}

impl Finding {
    pub fn kind(&self) -> CheckKind {
        match self {
            Finding::Certificate(_) => CheckKind::Certificate,
            Finding::Enforcement(_) => CheckKind::Enforcement,
            Finding::Hsts(_) => CheckKind::Hsts,
            Finding::Implementation(_) => CheckKind::Implementation,
            Finding::TlsVersion(_) => CheckKind::TlsVersion,
            Finding::Cipher(_) => CheckKind::Cipher,
        }
    }
}

/// The unit that gets published: a finding stamped with its domain and completion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub finding: Finding,
}

impl FindingRecord {
    pub fn new(domain: impl Into<String>, finding: Finding) -> Self {
        Self {
            domain: domain.into(),
            timestamp: Utc::now(),
            finding,
        }
    }
}

// --- Gravità ---
// Severity levels used by the knowledge base.

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

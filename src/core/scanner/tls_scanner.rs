// src/core/scanner/tls_scanner.rs

use tracing::{debug, info};

use crate::core::error::ScanError;
use crate::core::models::{
    CipherFinding, CipherTier, TlsObservation, TlsVersionFinding, TlsVersionLabel, UsedCipher,
};
use crate::core::scanner::probe::TlsProber;

/// Wire protocol versions and the labels they are reported as.
static TLS_VERSIONS: &[(u16, TlsVersionLabel)] = &[
    (0x0300, TlsVersionLabel::Ssl30),
    (0x0301, TlsVersionLabel::Tls10),
    (0x0302, TlsVersionLabel::Tls11),
    (0x0303, TlsVersionLabel::Tls12),
    (0x0304, TlsVersionLabel::Tls13),
];

/// AEAD suites with forward secrecy, plus every TLS 1.3 suite.
pub static STRONG_CIPHERS: &[&str] = &[
    "TLS_AES_256_GCM_SHA384",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_AES_128_GCM_SHA256",
    "TLS_AES_128_CCM_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_DHE_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_DHE_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_DHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
];

/// CBC suites and static-RSA key exchange: not broken, but without AEAD or forward secrecy.
pub static ACCEPTABLE_CIPHERS: &[&str] = &[
    "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384",
    "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384",
    "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA256",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
    "TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
    "TLS_DHE_RSA_WITH_AES_256_CBC_SHA256",
    "TLS_DHE_RSA_WITH_AES_128_CBC_SHA256",
    "TLS_DHE_RSA_WITH_AES_256_CBC_SHA",
    "TLS_DHE_RSA_WITH_AES_128_CBC_SHA",
    "TLS_RSA_WITH_AES_256_GCM_SHA384",
    "TLS_RSA_WITH_AES_128_GCM_SHA256",
    "TLS_RSA_WITH_AES_256_CBC_SHA256",
    "TLS_RSA_WITH_AES_128_CBC_SHA256",
    "TLS_RSA_WITH_AES_256_CBC_SHA",
    "TLS_RSA_WITH_AES_128_CBC_SHA",
];

pub static WEAK_CIPHERS: &[&str] = &[
    "TLS_ECDHE_RSA_WITH_3DES_EDE_CBC_SHA",
    "TLS_DHE_RSA_WITH_3DES_EDE_CBC_SHA",
    "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
    "TLS_ECDHE_RSA_WITH_RC4_128_SHA",
    "TLS_ECDHE_ECDSA_WITH_RC4_128_SHA",
    "TLS_RSA_WITH_RC4_128_SHA",
    "TLS_RSA_WITH_RC4_128_MD5",
    "TLS_RSA_WITH_DES_CBC_SHA",
    "TLS_DHE_RSA_WITH_DES_CBC_SHA",
    "TLS_RSA_EXPORT_WITH_RC4_40_MD5",
    "TLS_RSA_EXPORT_WITH_DES40_CBC_SHA",
    "TLS_RSA_WITH_NULL_SHA256",
    "TLS_RSA_WITH_NULL_SHA",
    "TLS_RSA_WITH_NULL_MD5",
    "TLS_DH_anon_WITH_AES_128_CBC_SHA",
    "TLS_DH_anon_WITH_AES_256_CBC_SHA",
    "TLS_ECDH_anon_WITH_AES_128_CBC_SHA",
];

const WEAK_MARKERS: &[&str] = &["NULL", "EXPORT", "_EXP", "RC4", "_DES", "3DES", "DES-", "MD5", "ANON", "ADH", "AECDH"];
const AEAD_MARKERS: &[&str] = &["GCM", "CHACHA20", "CCM"];
const FORWARD_SECRET_MARKERS: &[&str] = &["ECDHE", "DHE"];

pub fn classify_version(code: Option<u16>) -> TlsVersionLabel {
    code.and_then(|code| TLS_VERSIONS.iter().find(|(known, _)| *known == code))
        .map(|(_, label)| *label)
        .unwrap_or(TlsVersionLabel::None)
}

/// Places a cipher suite in exactly one tier.
///
/// Catalog membership wins. Suites the catalogs do not list are classified by the
/// markers in their name so that no suite is left without a tier.
pub fn classify_cipher(suite: &str) -> CipherTier {
    if STRONG_CIPHERS.contains(&suite) {
        return CipherTier::Strong;
    }
    if ACCEPTABLE_CIPHERS.contains(&suite) {
        return CipherTier::Acceptable;
    }
    if WEAK_CIPHERS.contains(&suite) {
        return CipherTier::Weak;
    }

    let upper = suite.to_ascii_uppercase();
    let has = |markers: &[&str]| markers.iter().any(|marker| upper.contains(marker));
    let tier = if has(WEAK_MARKERS) {
        CipherTier::Weak
    } else if has(AEAD_MARKERS) && (has(FORWARD_SECRET_MARKERS) || is_tls13_suite(&upper)) {
        CipherTier::Strong
    } else {
        CipherTier::Acceptable
    };
    debug!(suite, tier = %tier, "Cipher suite not in catalog, classified by name.");
    tier
}

fn is_tls13_suite(upper: &str) -> bool {
    upper.starts_with("TLS_AES_") || upper.starts_with("TLS_CHACHA20_")
}

pub fn build_cipher_finding(negotiated: Option<&str>) -> CipherFinding {
    let catalog = |suites: &[&str]| suites.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    CipherFinding {
        used: negotiated.map(|suite| UsedCipher {
            suite: suite.to_string(),
            tier: classify_cipher(suite),
        }),
        strong_ciphers: catalog(STRONG_CIPHERS),
        acceptable_ciphers: catalog(ACCEPTABLE_CIPHERS),
        weak_ciphers: catalog(WEAK_CIPHERS),
    }
}

/// Classifies a TLS observation for the version check.
///
/// A refused port or a handshake that cannot complete means no TLS is on offer, which is
/// reported as `None`. Anything else that stops the dial is an error.
pub fn version_finding(observation: &TlsObservation) -> Result<TlsVersionFinding, ScanError> {
    match (&observation.failure, observation.dial_succeeded) {
        (_, true) => Ok(TlsVersionFinding { label: classify_version(observation.negotiated_version) }),
        (Some(failure), false) if failure.tls_not_offered() => Ok(TlsVersionFinding { label: TlsVersionLabel::None }),
        (Some(failure), false) => Err(failure.clone().into()),
        (None, false) => Err(ScanError::ProbeUnavailable("TLS dial did not succeed".into())),
    }
}

pub fn cipher_finding(observation: &TlsObservation) -> Result<CipherFinding, ScanError> {
    match (&observation.failure, observation.dial_succeeded) {
        (_, true) => Ok(build_cipher_finding(observation.negotiated_cipher_suite.as_deref())),
        (Some(failure), false) if failure.tls_not_offered() => Ok(build_cipher_finding(None)),
        (Some(failure), false) => Err(failure.clone().into()),
        (None, false) => Err(ScanError::ProbeUnavailable("TLS dial did not succeed".into())),
    }
}

pub async fn run_version_check(prober: &dyn TlsProber, domain: &str) -> Result<TlsVersionFinding, ScanError> {
    info!(domain, "Starting TLS version check.");
    let finding = version_finding(&prober.probe_tls(domain).await)?;
    info!(domain, label = %finding.label, "TLS version check finished.");
    Ok(finding)
}

pub async fn run_cipher_check(prober: &dyn TlsProber, domain: &str) -> Result<CipherFinding, ScanError> {
    info!(domain, "Starting cipher check.");
    let finding = cipher_finding(&prober.probe_tls(domain).await)?;
    match &finding.used {
        Some(used) => info!(domain, suite = %used.suite, tier = %used.tier, "Cipher check finished."),
        None => info!(domain, "Cipher check finished, no TLS offered."),
    }
    Ok(finding)
}

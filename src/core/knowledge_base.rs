//! Static, read-only database of every outcome a check can produce, with a
//! human-readable explanation and remediation for each one.
//! Findings on the bus stay compact; this table is what turns them into advice.

use crate::core::models::{
    CipherTier, EnforcementLevel, Finding, HstsStatus, ImplementationStatus, Severity, TlsVersionLabel,
};
use serde::Serialize;
use std::fmt;

/// High-level grouping of outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum FindingCategory {
    /// Certificate chain validity and trust.
    Certificate,
    /// Negotiated protocol version and cipher suite.
    Transport,
    /// HTTPS availability, redirects and HSTS.
    Http,
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingCategory::Certificate => write!(f, "Certificate Chain"),
            FindingCategory::Transport => write!(f, "TLS Protocol & Ciphers"),
            FindingCategory::Http => write!(f, "HTTPS Enforcement"),
        }
    }
}

/// Everything needed to present one outcome to a user.
#[derive(Debug, Serialize)]
pub struct FindingDetail {
    /// Unique, machine-readable identifier (e.g. "HSTS_MAX_AGE_TOO_SHORT").
    pub code: &'static str,
    pub title: &'static str,
    pub category: FindingCategory,
    pub severity: Severity,
    pub description: &'static str,
    pub remediation: &'static str,
}

static FINDINGS: &[FindingDetail] = &[
    // --- Certificate ---
    FindingDetail {
        code: "CERT_VALID",
        title: "Certificate Chain Valid",
        category: FindingCategory::Certificate,
        severity: Severity::Info,
        description: "Every certificate in the chain is within its validity period, none is self-signed, and the chain leads to a trusted root.",
        remediation: "No action needed. Keep automated renewal in place so the chain stays valid.",
    },
    FindingDetail {
        code: "CERT_EXPIRED",
        title: "Certificate Expired",
        category: FindingCategory::Certificate,
        severity: Severity::Critical,
        description: "At least one certificate in the chain is past its expiry date. Browsers will show a full-page warning and most clients will refuse to connect.",
        remediation: "Renew the expired certificate (or intermediate) immediately and automate renewals, e.g. with an ACME client.",
    },
    FindingDetail {
        code: "CERT_SELF_SIGNED",
        title: "Self-Signed Certificate in Chain",
        category: FindingCategory::Certificate,
        severity: Severity::Critical,
        description: "A certificate in the served chain is issued by itself. Unless it is a root that clients already trust, visitors cannot verify who they are talking to.",
        remediation: "Serve a certificate issued by a publicly trusted CA and do not include the root certificate in the served chain.",
    },
    FindingDetail {
        code: "CERT_UNTRUSTED_CHAIN",
        title: "Chain Not Anchored to a Trusted Root",
        category: FindingCategory::Certificate,
        severity: Severity::Critical,
        description: "The chain could not be verified against the system trust store. This usually means a private CA or a missing intermediate certificate.",
        remediation: "Install the full intermediate chain on the server and make sure the issuing CA is publicly trusted.",
    },
    // --- Transport ---
    FindingDetail {
        code: "TLS_VERSION_MODERN",
        title: "Modern TLS Version",
        category: FindingCategory::Transport,
        severity: Severity::Info,
        description: "The server negotiated TLS 1.2 or TLS 1.3.",
        remediation: "No action needed. Prefer TLS 1.3 where the platform supports it.",
    },
    FindingDetail {
        code: "TLS_VERSION_LEGACY",
        title: "Legacy TLS Version",
        category: FindingCategory::Transport,
        severity: Severity::Critical,
        description: "The server negotiated SSL 3.0, TLS 1.0 or TLS 1.1. These versions are deprecated and vulnerable to known downgrade and padding attacks.",
        remediation: "Disable SSL 3.0, TLS 1.0 and TLS 1.1 and enable TLS 1.2 and TLS 1.3.",
    },
    FindingDetail {
        code: "TLS_VERSION_NONE",
        title: "No TLS Offered",
        category: FindingCategory::Transport,
        severity: Severity::Critical,
        description: "No TLS session could be established on port 443.",
        remediation: "Serve HTTPS on port 443 with a valid certificate.",
    },
    FindingDetail {
        code: "CIPHER_STRONG",
        title: "Strong Cipher Suite",
        category: FindingCategory::Transport,
        severity: Severity::Info,
        description: "The negotiated suite uses authenticated encryption with forward secrecy.",
        remediation: "No action needed.",
    },
    FindingDetail {
        code: "CIPHER_ACCEPTABLE",
        title: "Acceptable Cipher Suite",
        category: FindingCategory::Transport,
        severity: Severity::Warning,
        description: "The negotiated suite is not broken but lacks authenticated encryption or forward secrecy.",
        remediation: "Prefer ECDHE suites with AES-GCM or ChaCha20-Poly1305 in the server's cipher order.",
    },
    FindingDetail {
        code: "CIPHER_WEAK",
        title: "Weak Cipher Suite",
        category: FindingCategory::Transport,
        severity: Severity::Critical,
        description: "The negotiated suite relies on broken primitives such as RC4, DES, 3DES, MD5, NULL or export-grade keys.",
        remediation: "Remove weak suites from the server configuration entirely.",
    },
    FindingDetail {
        code: "CIPHER_NONE",
        title: "No Cipher Negotiated",
        category: FindingCategory::Transport,
        severity: Severity::Critical,
        description: "No TLS session could be established, so no cipher suite was negotiated.",
        remediation: "Serve HTTPS on port 443 with a modern cipher configuration.",
    },
    // --- HTTP ---
    FindingDetail {
        code: "HTTPS_VALID",
        title: "HTTPS Available",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "The site is reachable over HTTPS and stays on HTTPS.",
        remediation: "No action needed.",
    },
    FindingDetail {
        code: "HTTPS_DOWNGRADES",
        title: "HTTPS Downgrades to HTTP",
        category: FindingCategory::Http,
        severity: Severity::Critical,
        description: "Requests made over HTTPS are redirected to plain HTTP, exposing visitors to interception.",
        remediation: "Remove redirects from HTTPS to HTTP and serve all content over HTTPS.",
    },
    FindingDetail {
        code: "HTTPS_MISSING",
        title: "HTTPS Not Available",
        category: FindingCategory::Http,
        severity: Severity::Critical,
        description: "The site does not accept HTTPS connections, or the TLS certificate is not valid for it.",
        remediation: "Obtain a certificate for the domain and serve the site over HTTPS.",
    },
    FindingDetail {
        code: "ENFORCEMENT_STRICT",
        title: "HTTP Redirects to HTTPS",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "Plain HTTP requests are redirected to HTTPS.",
        remediation: "No action needed. Add HSTS so browsers skip the insecure first request.",
    },
    FindingDetail {
        code: "ENFORCEMENT_MODERATE",
        title: "HTTPS Available but Not Enforced",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "HTTPS works, but plain HTTP requests are served without a redirect to HTTPS.",
        remediation: "Redirect every plain HTTP request to the HTTPS version of the same URL with a 301.",
    },
    FindingDetail {
        code: "ENFORCEMENT_NONE",
        title: "HTTPS Not Enforced",
        category: FindingCategory::Http,
        severity: Severity::Critical,
        description: "Plain HTTP is not upgraded and HTTPS is unavailable or downgrades to HTTP.",
        remediation: "Serve the site over HTTPS and redirect all plain HTTP traffic to it.",
    },
    FindingDetail {
        code: "HSTS_MISSING",
        title: "HSTS Header Missing",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "No usable Strict-Transport-Security header was returned over HTTPS. Browsers will keep trying plain HTTP first, which allows downgrade attacks.",
        remediation: "Add 'Strict-Transport-Security: max-age=31536000; includeSubDomains; preload' to HTTPS responses.",
    },
    FindingDetail {
        code: "HSTS_MAX_AGE_TOO_SHORT",
        title: "HSTS max-age Too Short",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "The HSTS policy expires in less than one year, so browsers forget it between visits.",
        remediation: "Raise max-age to at least 31536000 seconds.",
    },
    FindingDetail {
        code: "HSTS_NO_SUBDOMAINS",
        title: "HSTS Does Not Cover Subdomains",
        category: FindingCategory::Http,
        severity: Severity::Warning,
        description: "The HSTS policy does not include subdomains, leaving them open to cookie injection and downgrade attacks.",
        remediation: "Add the includeSubDomains directive once every subdomain serves HTTPS.",
    },
    FindingDetail {
        code: "HSTS_NOT_PRELOADED",
        title: "HSTS Valid but Not Preload-Ready",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "The HSTS policy is strong but lacks the preload directive, so first-time visitors are still unprotected.",
        remediation: "Add the preload directive and submit the domain to the HSTS preload list.",
    },
    FindingDetail {
        code: "HSTS_FULL",
        title: "HSTS Fully Implemented",
        category: FindingCategory::Http,
        severity: Severity::Info,
        description: "The HSTS policy covers a year or more, includes subdomains and is preload-ready.",
        remediation: "No action needed.",
    },
];

/// The knowledge base code describing a finding.
pub fn finding_code(finding: &Finding) -> &'static str {
    match finding {
        Finding::Certificate(c) if c.expired => "CERT_EXPIRED",
        Finding::Certificate(c) if c.self_signed => "CERT_SELF_SIGNED",
        Finding::Certificate(c) if c.bad_chain => "CERT_UNTRUSTED_CHAIN",
        Finding::Certificate(_) => "CERT_VALID",
        Finding::TlsVersion(v) => match v.label {
            TlsVersionLabel::Tls12 | TlsVersionLabel::Tls13 => "TLS_VERSION_MODERN",
            TlsVersionLabel::Ssl30 | TlsVersionLabel::Tls10 | TlsVersionLabel::Tls11 => "TLS_VERSION_LEGACY",
            TlsVersionLabel::None => "TLS_VERSION_NONE",
        },
        Finding::Cipher(c) => match c.used.as_ref().map(|u| u.tier) {
            Some(CipherTier::Strong) => "CIPHER_STRONG",
            Some(CipherTier::Acceptable) => "CIPHER_ACCEPTABLE",
            Some(CipherTier::Weak) => "CIPHER_WEAK",
            None => "CIPHER_NONE",
        },
        Finding::Implementation(i) => match i.status {
            ImplementationStatus::ValidHttps => "HTTPS_VALID",
            ImplementationStatus::DowngradesHttps => "HTTPS_DOWNGRADES",
            ImplementationStatus::NoHttps => "HTTPS_MISSING",
        },
        Finding::Enforcement(e) => match e.level {
            EnforcementLevel::Strict => "ENFORCEMENT_STRICT",
            EnforcementLevel::Moderate => "ENFORCEMENT_MODERATE",
            EnforcementLevel::NotEnforced => "ENFORCEMENT_NONE",
        },
        Finding::Hsts(h) => match h.status {
            HstsStatus::NoHsts => "HSTS_MISSING",
            HstsStatus::MaxAgeTooShort => "HSTS_MAX_AGE_TOO_SHORT",
            HstsStatus::NotIncludingSubDomains => "HSTS_NO_SUBDOMAINS",
            HstsStatus::ValidNotPreloaded => "HSTS_NOT_PRELOADED",
            HstsStatus::FullyImplemented => "HSTS_FULL",
        },
    }
}

/// Retrieves the full detail for a given finding code.
pub fn get_finding_detail(code: &str) -> Option<&'static FindingDetail> {
    FINDINGS.iter().find(|f| f.code == code)
}

/// Looks up the detail describing a finding.
pub fn assess(finding: &Finding) -> Option<&'static FindingDetail> {
    get_finding_detail(finding_code(finding))
}

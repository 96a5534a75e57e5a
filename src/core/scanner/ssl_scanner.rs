// src/core/scanner/ssl_scanner.rs

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::error::ScanError;
use crate::core::models::{CertificateFinding, ProbeFailure, FailureKind, TlsObservation};
use crate::core::scanner::probe::TlsProber;

/// Runs the certificate check: one TLS dial, then evaluation of the peer chain.
///
/// # Arguments
/// * `prober` - The TLS prober used to dial the target.
/// * `domain` - A validated hostname.
/// * `require_trusted_root` - Whether an untrusted root should count as a bad chain.
pub async fn run_certificate_check(
    prober: &dyn TlsProber,
    domain: &str,
    require_trusted_root: bool,
) -> Result<CertificateFinding, ScanError> {
    info!(domain, "Starting certificate check.");
    let observation = prober.probe_tls(domain).await;
    let finding = evaluate_certificates(&observation, Utc::now(), require_trusted_root)?;
    info!(
        domain,
        expired = finding.expired,
        self_signed = finding.self_signed,
        bad_chain = finding.bad_chain,
        "Certificate check finished."
    );
    Ok(finding)
}

/// Classifies the peer chain of a TLS observation.
///
/// A failed dial is never reported as a clean chain: it surfaces as
/// `ProbeTimeout` or `ProbeUnavailable` instead.
pub fn evaluate_certificates(
    observation: &TlsObservation,
    now: DateTime<Utc>,
    require_trusted_root: bool,
) -> Result<CertificateFinding, ScanError> {
    if !observation.dial_succeeded {
        let failure = observation
            .failure
            .clone()
            .unwrap_or_else(|| ProbeFailure::new(FailureKind::Other, "TLS dial did not succeed"));
        return Err(failure.into());
    }

    if observation.chain_parse_failures > 0 {
        return Err(ScanError::ProbeUnavailable(format!(
            "{} peer certificate(s) could not be parsed",
            observation.chain_parse_failures
        )));
    }

    let chain = &observation.peer_certificate_chain;
    if chain.is_empty() {
        return Err(ScanError::ProbeUnavailable("server presented no certificate".into()));
    }

    let mut expired = false;
    let mut self_signed = false;
    for cert in chain {
        if now > cert.not_after {
            debug!(subject = %cert.subject_common_name, not_after = %cert.not_after, "Certificate is expired.");
            expired = true;
        }
        if cert.issuer_common_name == cert.subject_common_name {
            debug!(subject = %cert.subject_common_name, "Certificate is self-signed.");
            self_signed = true;
        }
    }

    let untrusted = require_trusted_root && observation.chain_trusted == Some(false);
    if untrusted {
        debug!("Chain does not lead to a trusted root.");
    }

    Ok(CertificateFinding {
        expired,
        self_signed,
        bad_chain: expired || self_signed || untrusted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Certificate;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn cert(subject: &str, issuer: &str, days_left: i64) -> Certificate {
        Certificate {
            subject_common_name: subject.into(),
            issuer_common_name: issuer.into(),
            not_before: now() - Duration::days(30),
            not_after: now() + Duration::days(days_left),
        }
    }

    fn observed(chain: Vec<Certificate>, trusted: Option<bool>) -> TlsObservation {
        TlsObservation {
            negotiated_version: Some(0x0303),
            negotiated_cipher_suite: Some("TLS_AES_128_GCM_SHA256".into()),
            peer_certificate_chain: chain,
            chain_parse_failures: 0,
            chain_trusted: trusted,
            dial_succeeded: true,
            failure: None,
        }
    }

    #[test]
    fn healthy_chain_has_no_flags() {
        let obs = observed(
            vec![cert("example.com", "R11", 60), cert("R11", "ISRG Root X1", 400)],
            Some(true),
        );
        let finding = evaluate_certificates(&obs, now(), true).unwrap();
        assert_eq!(finding, CertificateFinding { expired: false, self_signed: false, bad_chain: false });
    }

    #[test]
    fn any_self_signed_member_marks_the_chain_bad() {
        let obs = observed(
            vec![
                cert("example.com", "R11", 60),
                cert("R11", "ISRG Root X1", 400),
                cert("ISRG Root X1", "ISRG Root X1", 3000),
            ],
            Some(true),
        );
        let finding = evaluate_certificates(&obs, now(), true).unwrap();
        assert!(finding.self_signed);
        assert!(finding.bad_chain);
        assert!(!finding.expired);
    }

    #[test]
    fn expiry_is_now_after_not_after() {
        let expired = observed(vec![cert("old.example.com", "R11", -1)], Some(true));
        let finding = evaluate_certificates(&expired, now(), true).unwrap();
        assert!(finding.expired);
        assert!(finding.bad_chain);

        // A certificate valid for years must not be flagged.
        let fresh = observed(vec![cert("new.example.com", "R11", 700)], Some(true));
        assert!(!evaluate_certificates(&fresh, now(), true).unwrap().expired);
    }

    #[test]
    fn untrusted_root_counts_only_when_required() {
        let obs = observed(vec![cert("internal.example", "Corp CA", 60)], Some(false));

        let strict = evaluate_certificates(&obs, now(), true).unwrap();
        assert!(strict.bad_chain);
        assert!(!strict.self_signed);

        let lenient = evaluate_certificates(&obs, now(), false).unwrap();
        assert!(!lenient.bad_chain);
    }

    #[test]
    fn failed_dial_is_not_a_clean_bill_of_health() {
        let refused = TlsObservation::failed(ProbeFailure::new(FailureKind::Refused, "connection refused"));
        assert!(matches!(
            evaluate_certificates(&refused, now(), true),
            Err(ScanError::ProbeUnavailable(_))
        ));

        let slow = TlsObservation::failed(ProbeFailure::new(FailureKind::Timeout, "handshake timed out"));
        assert!(matches!(evaluate_certificates(&slow, now(), true), Err(ScanError::ProbeTimeout(_))));
    }

    #[test]
    fn empty_chain_is_unavailable() {
        let obs = observed(Vec::new(), None);
        assert!(matches!(
            evaluate_certificates(&obs, now(), true),
            Err(ScanError::ProbeUnavailable(_))
        ));
    }

    #[test]
    fn unreadable_chain_member_is_not_scored() {
        // The readable part of the chain looks clean; the unreadable member might not be.
        let mut obs = observed(vec![cert("example.com", "Example CA", 60)], Some(true));
        obs.chain_parse_failures = 1;
        assert!(matches!(
            evaluate_certificates(&obs, now(), true),
            Err(ScanError::ProbeUnavailable(_))
        ));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let obs = observed(vec![cert("example.com", "example.com", -5)], Some(false));
        let first = evaluate_certificates(&obs, now(), true).unwrap();
        let second = evaluate_certificates(&obs, now(), true).unwrap();
        assert_eq!(first, second);
        assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
    }
}

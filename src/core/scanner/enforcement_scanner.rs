// src/core/scanner/enforcement_scanner.rs

use tracing::{debug, info};

use crate::core::error::ScanError;
use crate::core::models::{
    EnforcementFinding, EnforcementLevel, FailureKind, HttpObservation, ImplementationFinding,
    ImplementationStatus, ProbeFailure,
};
use crate::core::scanner::probe::HttpProber;

/// Decides how strictly a domain pushes plaintext visitors onto HTTPS.
///
/// # Arguments
/// * `prober` - The HTTP prober used for both requests.
/// * `domain` - A validated hostname.
///
/// # Returns
/// `Strict` when `http://` ends on an `https` URL, `Moderate` when it does not but
/// `https://` works, `NotEnforced` otherwise. A transport error on the plaintext request
/// is returned as an error rather than guessed at.
pub async fn run_enforcement_check(prober: &dyn HttpProber, domain: &str) -> Result<EnforcementFinding, ScanError> {
    info!(domain, "Starting HTTPS enforcement check.");

    let plaintext = prober.fetch(&format!("http://{domain}")).await.map_err(|failure| {
        debug!(domain, error = %failure, "Plaintext request failed, enforcement cannot be determined.");
        ScanError::from(failure)
    })?;

    let level = if plaintext.resolved_to_https() {
        debug!(domain, final_url = %plaintext.final_url, "Plaintext request upgraded to HTTPS.");
        EnforcementLevel::Strict
    } else {
        match prober.fetch(&format!("https://{domain}")).await {
            Ok(secure) => moderate_or_not(&secure),
            Err(failure) if failure.kind == FailureKind::Timeout => return Err(failure.into()),
            Err(failure) => {
                debug!(domain, error = %failure, "HTTPS request failed, enforcement absent.");
                EnforcementLevel::NotEnforced
            }
        }
    };

    info!(domain, level = %level, "HTTPS enforcement check finished.");
    Ok(EnforcementFinding { level })
}

fn moderate_or_not(secure: &HttpObservation) -> EnforcementLevel {
    if secure.resolved_to_https() {
        EnforcementLevel::Moderate
    } else {
        EnforcementLevel::NotEnforced
    }
}

/// Checks whether `https://<domain>` is served over HTTPS at all.
pub async fn run_implementation_check(
    prober: &dyn HttpProber,
    domain: &str,
) -> Result<ImplementationFinding, ScanError> {
    info!(domain, "Starting HTTPS implementation check.");
    let status = implementation_status(prober.fetch(&format!("https://{domain}")).await)?;
    info!(domain, status = %status, "HTTPS implementation check finished.");
    Ok(ImplementationFinding { status })
}

fn implementation_status(outcome: Result<HttpObservation, ProbeFailure>) -> Result<ImplementationStatus, ScanError> {
    match outcome {
        Ok(observation) if observation.resolved_to_https() => Ok(ImplementationStatus::ValidHttps),
        Ok(_) => Ok(ImplementationStatus::DowngradesHttps),
        Err(failure) if failure.tls_not_offered() => Ok(ImplementationStatus::NoHttps),
        Err(failure) => Err(failure.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    /// Answers each URL from a fixed table and remembers what was asked.
    struct ScriptedProber {
        responses: HashMap<String, Result<HttpObservation, ProbeFailure>>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedProber {
        fn new(responses: Vec<(&str, Result<HttpObservation, ProbeFailure>)>) -> Self {
            Self {
                responses: responses.into_iter().map(|(url, r)| (url.to_string(), r)).collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpProber for ScriptedProber {
        async fn fetch(&self, url: &str) -> Result<HttpObservation, ProbeFailure> {
            self.requested.lock().unwrap().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .unwrap_or_else(|| Err(ProbeFailure::new(FailureKind::Other, "unscripted url")))
        }
    }

    fn landed_on(url: &str) -> Result<HttpObservation, ProbeFailure> {
        Ok(HttpObservation { final_url: Url::parse(url).unwrap(), status: 200, hsts_header: None })
    }

    fn failed(kind: FailureKind) -> Result<HttpObservation, ProbeFailure> {
        Err(ProbeFailure::new(kind, "scripted failure"))
    }

    #[tokio::test]
    async fn redirect_to_https_is_strict() {
        let prober = ScriptedProber::new(vec![("http://example.com", landed_on("https://www.example.com/"))]);
        let finding = run_enforcement_check(&prober, "example.com").await.unwrap();
        assert_eq!(finding.level, EnforcementLevel::Strict);
        assert_eq!(prober.requested(), vec!["http://example.com"]);
    }

    #[tokio::test]
    async fn working_https_without_redirect_is_moderate() {
        let prober = ScriptedProber::new(vec![
            ("http://example.com", landed_on("http://example.com/")),
            ("https://example.com", landed_on("https://example.com/")),
        ]);
        let finding = run_enforcement_check(&prober, "example.com").await.unwrap();
        assert_eq!(finding.level, EnforcementLevel::Moderate);
    }

    #[tokio::test]
    async fn broken_or_downgrading_https_is_not_enforced() {
        let prober = ScriptedProber::new(vec![
            ("http://example.com", landed_on("http://example.com/")),
            ("https://example.com", failed(FailureKind::Refused)),
        ]);
        assert_eq!(
            run_enforcement_check(&prober, "example.com").await.unwrap().level,
            EnforcementLevel::NotEnforced
        );

        let prober = ScriptedProber::new(vec![
            ("http://example.com", landed_on("http://example.com/")),
            ("https://example.com", landed_on("http://example.com/")),
        ]);
        assert_eq!(
            run_enforcement_check(&prober, "example.com").await.unwrap().level,
            EnforcementLevel::NotEnforced
        );
    }

    #[tokio::test]
    async fn plaintext_transport_error_is_surfaced() {
        let prober = ScriptedProber::new(vec![
            ("http://example.com", failed(FailureKind::Dns)),
            ("https://example.com", failed(FailureKind::Dns)),
        ]);
        let err = run_enforcement_check(&prober, "example.com").await.unwrap_err();
        assert!(matches!(err, ScanError::ProbeUnavailable(_)));
    }

    #[tokio::test]
    async fn https_timeout_is_not_guessed() {
        let prober = ScriptedProber::new(vec![
            ("http://example.com", landed_on("http://example.com/")),
            ("https://example.com", failed(FailureKind::Timeout)),
        ]);
        let err = run_enforcement_check(&prober, "example.com").await.unwrap_err();
        assert!(matches!(err, ScanError::ProbeTimeout(_)));
    }

    #[test]
    fn implementation_outcomes() {
        assert_eq!(
            implementation_status(landed_on("https://example.com/")).unwrap(),
            ImplementationStatus::ValidHttps
        );
        assert_eq!(
            implementation_status(landed_on("http://example.com/")).unwrap(),
            ImplementationStatus::DowngradesHttps
        );
        assert_eq!(implementation_status(failed(FailureKind::Refused)).unwrap(), ImplementationStatus::NoHttps);
        assert_eq!(implementation_status(failed(FailureKind::Tls)).unwrap(), ImplementationStatus::NoHttps);
        assert!(matches!(
            implementation_status(failed(FailureKind::Dns)),
            Err(ScanError::ProbeUnavailable(_))
        ));
        assert!(matches!(
            implementation_status(failed(FailureKind::Timeout)),
            Err(ScanError::ProbeTimeout(_))
        ));
    }
}

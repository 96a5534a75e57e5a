// src/core/scanner/headers_scanner.rs

use tracing::{debug, info, warn};

use crate::core::error::ScanError;
use crate::core::models::{HstsFinding, HstsStatus};
use crate::core::scanner::probe::HttpProber;

/// One year, the minimum `max-age` accepted for a complete HSTS policy.
pub const MIN_HSTS_MAX_AGE: u64 = 31_536_000;

/// The directives found in a `Strict-Transport-Security` header value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HstsDirectives {
    /// `None` when the directive is missing or its value is not a number.
    pub max_age: Option<u64>,
    pub include_sub_domains: bool,
    pub preload: bool,
}

/// Parses an HSTS header value.
///
/// Directives are split on `;` and matched independently of their position, spacing or
/// case. A quoted `max-age` value is accepted. When `max-age` appears more than once,
/// the first occurrence is used.
pub fn parse_hsts(header: &str) -> HstsDirectives {
    let mut directives = HstsDirectives::default();
    let mut seen_max_age = false;

    for raw in header.split(';') {
        let directive = raw.trim();
        if directive.is_empty() {
            continue;
        }

        let (name, value) = match directive.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (directive, None),
        };

        if name.eq_ignore_ascii_case("max-age") {
            if seen_max_age {
                debug!(directive, "Ignoring repeated max-age directive.");
                continue;
            }
            seen_max_age = true;
            let digits = value.unwrap_or_default().trim_matches('"');
            // delta-seconds is 1*DIGIT: no sign, no whitespace.
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                warn!(directive, "Unparseable max-age in HSTS header.");
                continue;
            }
            directives.max_age = match digits.parse::<u64>() {
                Ok(seconds) => Some(seconds),
                Err(e) => {
                    warn!(directive, error = %e, "Out of range max-age in HSTS header.");
                    None
                }
            };
        } else if name.eq_ignore_ascii_case("includeSubDomains") {
            directives.include_sub_domains = true;
        } else if name.eq_ignore_ascii_case("preload") {
            directives.preload = true;
        } else {
            debug!(directive, "Ignoring unknown HSTS directive.");
        }
    }

    directives
}

/// Classifies an HSTS header, or its absence, into a finding.
pub fn classify_hsts(header: Option<&str>) -> HstsFinding {
    let Some(header) = header else {
        return HstsFinding { status: HstsStatus::NoHsts, preloaded: false, max_age_seconds: 0 };
    };

    let directives = parse_hsts(header);
    let Some(max_age) = directives.max_age else {
        return HstsFinding { status: HstsStatus::NoHsts, preloaded: false, max_age_seconds: 0 };
    };

    let status = if max_age < MIN_HSTS_MAX_AGE {
        HstsStatus::MaxAgeTooShort
    } else if !directives.include_sub_domains {
        HstsStatus::NotIncludingSubDomains
    } else if !directives.preload {
        HstsStatus::ValidNotPreloaded
    } else {
        HstsStatus::FullyImplemented
    };

    HstsFinding {
        status,
        preloaded: status == HstsStatus::FullyImplemented,
        max_age_seconds: max_age,
    }
}

/// Fetches `https://<domain>` and classifies its HSTS policy.
///
/// A response that ended up on plain HTTP carries no usable policy, since browsers
/// ignore HSTS received over an insecure transport.
pub async fn run_hsts_check(prober: &dyn HttpProber, domain: &str) -> Result<HstsFinding, ScanError> {
    info!(domain, "Starting HSTS check.");
    let finding = match prober.fetch(&format!("https://{domain}")).await {
        Ok(observation) if observation.resolved_to_https() => classify_hsts(observation.hsts_header.as_deref()),
        Ok(observation) => {
            debug!(domain, final_url = %observation.final_url, "HTTPS request downgraded, HSTS not honoured.");
            classify_hsts(None)
        }
        Err(failure) if failure.tls_not_offered() => {
            debug!(domain, error = %failure, "HTTPS not offered, no HSTS possible.");
            classify_hsts(None)
        }
        Err(failure) => return Err(failure.into()),
    };
    info!(domain, status = %finding.status, max_age = finding.max_age_seconds, "HSTS check finished.");
    Ok(finding)
}

// src/core/validator.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::core::error::ScanError;
use crate::core::models::ScanRequest;

const MAX_HOSTNAME_LEN: usize = 253;

// One or more dot-separated labels of 1-63 alphanumerics or inner hyphens.
static HOSTNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$").unwrap()
});

/// Extracts and validates the `domain` field of an inbound payload.
///
/// # Arguments
/// * `payload` - The decoded request body, expected to look like `{"domain": "example.com"}`.
///
/// # Returns
/// A `ScanRequest` on success, or `ScanError::InvalidInput` describing what was wrong.
pub fn validate_request(payload: &Value) -> Result<ScanRequest, ScanError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ScanError::InvalidInput("request body must be a JSON object".into()))?;

    match object.get("domain") {
        Some(Value::String(domain)) => validate_domain(domain),
        Some(_) => Err(ScanError::InvalidInput("`domain` must be a string".into())),
        None => Err(ScanError::InvalidInput("missing `domain` field".into())),
    }
}

pub fn validate_domain(raw: &str) -> Result<ScanRequest, ScanError> {
    if raw.is_empty() {
        return Err(ScanError::InvalidInput("domain is empty".into()));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(ScanError::InvalidInput("domain contains whitespace".into()));
    }

    let lowered = raw.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        return Err(ScanError::InvalidInput("domain must not include a scheme".into()));
    }

    let host = lowered.strip_suffix('.').unwrap_or(&lowered);
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(ScanError::InvalidInput(format!(
            "domain is longer than {MAX_HOSTNAME_LEN} characters"
        )));
    }
    if !HOSTNAME.is_match(host) {
        return Err(ScanError::InvalidInput(format!("`{raw}` is not a valid hostname")));
    }

    debug!(domain = host, "Domain accepted.");
    Ok(ScanRequest::new(host.to_string()))
}

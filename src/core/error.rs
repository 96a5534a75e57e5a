// src/core/error.rs

use thiserror::Error;

use crate::core::models::{FailureKind, ProbeFailure};

/// Everything a single scan can fail with. None of these are fatal to the process.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Malformed or missing domain. No probe was attempted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An outbound call or the whole check ran past its deadline.
    #[error("probe timed out: {0}")]
    ProbeTimeout(String),

    /// The target could not be observed, so no security claim can be made.
    #[error("probe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("publish failed after {attempts} attempt(s): {message}")]
    PublishFailure { attempts: u32, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Stable machine-readable name, used in API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::InvalidInput(_) => "InvalidInput",
            ScanError::ProbeTimeout(_) => "ProbeTimeout",
            ScanError::ProbeUnavailable(_) => "ProbeUnavailable",
            ScanError::PublishFailure { .. } => "PublishFailure",
            ScanError::Internal(_) => "Internal",
        }
    }
}

impl From<ProbeFailure> for ScanError {
    fn from(failure: ProbeFailure) -> Self {
        match failure.kind {
            FailureKind::Timeout => ScanError::ProbeTimeout(failure.message),
            _ => ScanError::ProbeUnavailable(failure.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_stay_distinct_from_unavailability() {
        let err: ScanError = ProbeFailure::new(FailureKind::Timeout, "handshake timed out").into();
        assert!(matches!(err, ScanError::ProbeTimeout(_)));

        let err: ScanError = ProbeFailure::new(FailureKind::Dns, "no such host").into();
        match err {
            ScanError::ProbeUnavailable(msg) => assert!(msg.contains("no such host")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn publish_failure_reports_attempts() {
        let err = ScanError::PublishFailure { attempts: 4, message: "broker down".into() };
        assert_eq!(err.code(), "PublishFailure");
        assert!(err.to_string().contains("4 attempt(s)"));
    }
}

// src/config.rs

//! Process configuration. Every setting can come from a flag or from the environment,
//! so the service can run unchanged as one container per check kind.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{ArgAction, Parser};
use thiserror::Error;

use crate::core::models::CheckKind;
use crate::core::publisher::{DEFAULT_SUBJECT, PublisherConfig, RetryPolicy};
use crate::core::scanner::EngineConfig;
use crate::core::scanner::probe::ProbeTimeouts;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("connect timeout ({connect_ms}ms) must not exceed the request timeout ({request_ms}ms)")]
    ConnectAfterRequest { connect_ms: u64, request_ms: u64 },

    #[error("request timeout ({request_ms}ms) must not exceed the scan deadline ({deadline_ms}ms)")]
    RequestAfterDeadline { request_ms: u64, deadline_ms: u64 },

    #[error("bus subject must not be empty")]
    EmptySubject,
}

/// HTTPS posture scanner: runs TLS and HTTP checks against a domain and publishes findings.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ServiceArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// Client name announced to the NATS server
    #[arg(long, env = "NATS_NAME", default_value = "https-posture-scanner")]
    pub nats_name: String,

    /// Subject findings are published on
    #[arg(long, env = "NATS_SUBJECT", default_value = DEFAULT_SUBJECT)]
    pub nats_subject: String,

    /// Address the HTTP listener binds to
    #[arg(long, env = "SCANNER_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Check served on `POST /` (certificate, enforcement, hsts, implementation, tls-version, cipher)
    #[arg(long, env = "SCANNER_CHECK")]
    pub check: Option<CheckKind>,

    /// TCP connect timeout for every probe, in milliseconds
    #[arg(long, env = "SCANNER_CONNECT_TIMEOUT_MS", default_value_t = 5_000)]
    pub connect_timeout_ms: u64,

    /// Upper bound on a single outbound request, in milliseconds
    #[arg(long, env = "SCANNER_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub request_timeout_ms: u64,

    /// Upper bound on a whole check, in milliseconds
    #[arg(long, env = "SCANNER_SCAN_DEADLINE_MS", default_value_t = 25_000)]
    pub scan_deadline_ms: u64,

    /// Upper bound on one publish attempt, in milliseconds
    #[arg(long, env = "SCANNER_PUBLISH_TIMEOUT_MS", default_value_t = 5_000)]
    pub publish_timeout_ms: u64,

    /// Publish retries after the first attempt
    #[arg(long, env = "SCANNER_PUBLISH_RETRIES", default_value_t = 3)]
    pub publish_retries: u32,

    /// Delay before the first publish retry, in milliseconds
    #[arg(long, env = "SCANNER_PUBLISH_BACKOFF_MS", default_value_t = 200)]
    pub publish_backoff_ms: u64,

    /// Treat a chain that does not verify against the system roots as a bad chain
    #[arg(long, env = "SCANNER_REQUIRE_TRUSTED_ROOT", default_value_t = true, action = ArgAction::Set)]
    pub require_trusted_root: bool,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "SCANNER_LOG", default_value = "info")]
    pub log_level: String,

    /// Also write logs to a file in the platform data directory
    #[arg(long, env = "SCANNER_LOG_FILE", default_value_t = false, action = ArgAction::Set)]
    pub log_file: bool,
}

impl ServiceArgs {
    /// Rejects combinations that would make every scan fail or hang.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("connect timeout", self.connect_timeout_ms),
            ("request timeout", self.request_timeout_ms),
            ("scan deadline", self.scan_deadline_ms),
            ("publish timeout", self.publish_timeout_ms),
            ("publish backoff", self.publish_backoff_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }

        if self.connect_timeout_ms > self.request_timeout_ms {
            return Err(ConfigError::ConnectAfterRequest {
                connect_ms: self.connect_timeout_ms,
                request_ms: self.request_timeout_ms,
            });
        }
        if self.request_timeout_ms > self.scan_deadline_ms {
            return Err(ConfigError::RequestAfterDeadline {
                request_ms: self.request_timeout_ms,
                deadline_ms: self.scan_deadline_ms,
            });
        }
        if self.nats_subject.trim().is_empty() {
            return Err(ConfigError::EmptySubject);
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            probe_timeouts: ProbeTimeouts {
                connect: Duration::from_millis(self.connect_timeout_ms),
                total: Duration::from_millis(self.request_timeout_ms),
            },
            scan_deadline: Duration::from_millis(self.scan_deadline_ms),
            require_trusted_root: self.require_trusted_root,
        }
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            subject: self.nats_subject.clone(),
            attempt_timeout: Duration::from_millis(self.publish_timeout_ms),
            retry: RetryPolicy {
                max_retries: self.publish_retries,
                initial_delay: Duration::from_millis(self.publish_backoff_ms),
                ..RetryPolicy::default()
            },
        }
    }
}

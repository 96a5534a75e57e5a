// src/core/scanner/probe.rs

//! Outbound probes. Everything that touches the network lives here, behind two
//! small traits so the classifiers can be exercised against fixed observations.

use std::error::Error as StdError;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use openssl::error::ErrorStack;
use openssl::ssl::{self, SslConnector, SslConnectorBuilder, SslMethod, SslOptions, SslVerifyMode, SslVersion};
use openssl::x509::X509VerifyResult;
use reqwest::header::STRICT_TRANSPORT_SECURITY;
use reqwest::redirect::Policy;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_openssl::SslStream;
use tracing::{debug, warn};
use x509_parser::prelude::*;

use crate::core::models::{Certificate, FailureKind, HttpObservation, ProbeFailure, TlsObservation};

const HTTPS_PORT: u16 = 443;
const MAX_REDIRECTS: usize = 10;
// Offer every suite OpenSSL was built with so legacy servers can still be observed.
const PERMISSIVE_CIPHER_LIST: &str = "ALL:@SECLEVEL=0";

/// Bounds applied to every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub connect: Duration,
    pub total: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            total: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeSetupError {
    #[error("failed to build TLS connector: {0}")]
    Tls(#[from] ErrorStack),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait TlsProber: Send + Sync {
    /// Dials the target over TLS and reports what was negotiated. Never fails:
    /// a dial that goes wrong comes back with `dial_succeeded == false`.
    async fn probe_tls(&self, domain: &str) -> TlsObservation;
}

#[async_trait]
pub trait HttpProber: Send + Sync {
    /// Issues a GET against `url`, following redirects.
    async fn fetch(&self, url: &str) -> Result<HttpObservation, ProbeFailure>;
}

// --- TLS ---

/// TLS prober backed by OpenSSL with chain verification turned off for the handshake.
///
/// The chain is still checked against the system trust store; the verdict is recorded
/// in `TlsObservation::chain_trusted` instead of aborting the connection.
pub struct OpensslProber {
    connector: SslConnector,
    timeouts: ProbeTimeouts,
    port: u16,
}

/// Connector that will negotiate anything the linked OpenSSL supports.
///
/// SSLv3 is only reachable when the OpenSSL build still ships it; otherwise an
/// SSLv3-only server fails the handshake.
fn permissive_connector() -> Result<SslConnectorBuilder, ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;
    builder.set_verify(SslVerifyMode::NONE);
    builder.clear_options(SslOptions::NO_SSLV3);
    builder.set_min_proto_version(None)?;
    builder.set_cipher_list(PERMISSIVE_CIPHER_LIST)?;
    Ok(builder)
}

impl OpensslProber {
    pub fn new(timeouts: ProbeTimeouts) -> Result<Self, ProbeSetupError> {
        Ok(Self {
            connector: permissive_connector()?.build(),
            timeouts,
            port: HTTPS_PORT,
        })
    }

    /// Targets a port other than 443. Used to probe local fixtures.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn handshake(&self, domain: &str) -> Result<TlsObservation, ProbeFailure> {
        debug!(domain, port = self.port, "Connecting TCP stream.");
        let tcp = timeout(self.timeouts.connect, TcpStream::connect((domain, self.port)))
            .await
            .map_err(|_| ProbeFailure::new(FailureKind::Timeout, "TCP connect timed out"))?
            .map_err(|e| classify_io_error(&e))?;

        let ssl = self
            .connector
            .configure()
            .and_then(|config| config.verify_hostname(false).into_ssl(domain))
            .map_err(|e| ProbeFailure::new(FailureKind::Other, format!("TLS setup failed: {e}")))?;
        let mut stream = SslStream::new(ssl, tcp)
            .map_err(|e| ProbeFailure::new(FailureKind::Other, format!("TLS setup failed: {e}")))?;

        debug!(domain, "Performing TLS handshake.");
        timeout(self.timeouts.total, Pin::new(&mut stream).connect())
            .await
            .map_err(|_| ProbeFailure::new(FailureKind::Timeout, "TLS handshake timed out"))?
            .map_err(|e| classify_handshake_error(&e))?;

        let ssl = stream.ssl();
        let (peer_certificate_chain, chain_parse_failures) = match ssl.peer_cert_chain() {
            Some(chain) => parse_chain(chain.iter().map(|cert| cert.to_der())),
            None => (Vec::new(), 0),
        };
        let observation = TlsObservation {
            negotiated_version: ssl.version2().and_then(version_code),
            negotiated_cipher_suite: ssl
                .current_cipher()
                .map(|cipher| cipher.standard_name().unwrap_or(cipher.name()).to_string()),
            peer_certificate_chain,
            chain_parse_failures,
            chain_trusted: Some(ssl.verify_result() == X509VerifyResult::OK),
            dial_succeeded: true,
            failure: None,
        };

        // The observation is complete; a failed close_notify changes nothing.
        if let Err(e) = stream.shutdown().await {
            debug!(domain, error = %e, "TLS shutdown did not complete cleanly.");
        }
        Ok(observation)
    }
}

#[async_trait]
impl TlsProber for OpensslProber {
    async fn probe_tls(&self, domain: &str) -> TlsObservation {
        match self.handshake(domain).await {
            Ok(observation) => {
                debug!(
                    domain,
                    version = ?observation.negotiated_version,
                    cipher = ?observation.negotiated_cipher_suite,
                    chain_len = observation.peer_certificate_chain.len(),
                    "TLS probe completed."
                );
                observation
            }
            Err(failure) => {
                warn!(domain, kind = %failure.kind, error = %failure.message, "TLS probe failed.");
                TlsObservation::failed(failure)
            }
        }
    }
}

fn version_code(version: SslVersion) -> Option<u16> {
    [
        (SslVersion::SSL3, 0x0300),
        (SslVersion::TLS1, 0x0301),
        (SslVersion::TLS1_1, 0x0302),
        (SslVersion::TLS1_2, 0x0303),
        (SslVersion::TLS1_3, 0x0304),
    ]
    .into_iter()
    .find(|(known, _)| *known == version)
    .map(|(_, code)| code)
}

/// Parses every member of a peer chain, counting the ones that could not be read.
fn parse_chain<I>(ders: I) -> (Vec<Certificate>, usize)
where
    I: IntoIterator<Item = Result<Vec<u8>, ErrorStack>>,
{
    let mut chain = Vec::new();
    let mut failures = 0;
    for der in ders {
        match der.ok().as_deref().and_then(certificate_from_der) {
            Some(cert) => chain.push(cert),
            None => failures += 1,
        }
    }
    (chain, failures)
}

/// Extracts the fields the certificate evaluator needs from a DER-encoded certificate.
pub fn certificate_from_der(der: &[u8]) -> Option<Certificate> {
    let (_, x509) = match parse_x509_certificate(der) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Failed to parse X.509 certificate.");
            return None;
        }
    };

    let validity = x509.validity();
    Some(Certificate {
        subject_common_name: common_name_or_dn(x509.subject()),
        issuer_common_name: common_name_or_dn(x509.issuer()),
        not_before: asn1_time_to_chrono_utc(&validity.not_before),
        not_after: asn1_time_to_chrono_utc(&validity.not_after),
    })
}

fn common_name_or_dn(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}

// --- HTTP ---

pub struct ReqwestProber {
    client: reqwest::Client,
}

impl ReqwestProber {
    pub fn new(timeouts: ProbeTimeouts) -> Result<Self, ProbeSetupError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("https-posture-scanner/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.total)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }

    /// Uses a client configured elsewhere, e.g. with pinned name resolution.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpProber for ReqwestProber {
    async fn fetch(&self, url: &str) -> Result<HttpObservation, ProbeFailure> {
        debug!(url, "Sending GET request.");
        let response = self.client.get(url).send().await.map_err(|e| {
            let failure = classify_reqwest_error(&e);
            debug!(url, kind = %failure.kind, error = %failure.message, "GET request failed.");
            failure
        })?;

        let hsts_header = response.headers().get(STRICT_TRANSPORT_SECURITY).map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .unwrap_or_else(|_| String::from_utf8_lossy(value.as_bytes()).into_owned())
        });

        let observation = HttpObservation {
            final_url: response.url().clone(),
            status: response.status().as_u16(),
            hsts_header,
        };
        debug!(url, final_url = %observation.final_url, status = observation.status, "GET request completed.");
        Ok(observation)
    }
}

// --- Failure classification ---

/// A handshake that breaks on the socket says nothing about TLS support, only an
/// error raised by the TLS layer itself does.
fn classify_handshake_error(err: &ssl::Error) -> ProbeFailure {
    match err.io_error() {
        Some(io_err) => {
            let failure = classify_io_error(io_err);
            ProbeFailure::new(failure.kind, format!("TLS handshake interrupted: {}", failure.message))
        }
        None => ProbeFailure::new(FailureKind::Tls, format!("TLS handshake failed: {err}")),
    }
}

fn classify_io_error(err: &io::Error) -> ProbeFailure {
    let message = err.to_string();
    let kind = match err.kind() {
        io::ErrorKind::ConnectionRefused => FailureKind::Refused,
        io::ErrorKind::TimedOut => FailureKind::Timeout,
        _ if looks_like_dns(&message.to_ascii_lowercase()) => FailureKind::Dns,
        _ => FailureKind::Other,
    };
    ProbeFailure::new(kind, message)
}

/// Maps a reqwest error onto a `FailureKind`.
///
/// Only the error's sources are inspected. The top-level message carries the request
/// URL, and a hostname must never decide the outcome.
pub fn classify_reqwest_error(err: &reqwest::Error) -> ProbeFailure {
    let message = err.to_string();
    if err.is_timeout() {
        return ProbeFailure::new(FailureKind::Timeout, message);
    }
    if !err.is_connect() {
        return ProbeFailure::new(FailureKind::Other, message);
    }

    let mut causes = Vec::new();
    let mut io_kinds = Vec::new();
    let mut current = err.source();
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            io_kinds.push(io_err.kind());
        }
        causes.push(e.to_string().to_ascii_lowercase());
        current = e.source();
    }
    let causes = causes.join(": ");

    let kind = if io_kinds.contains(&io::ErrorKind::ConnectionRefused) || causes.contains("connection refused") {
        FailureKind::Refused
    } else if io_kinds.contains(&io::ErrorKind::TimedOut) {
        FailureKind::Timeout
    } else if looks_like_dns(&causes) {
        FailureKind::Dns
    } else if io_kinds.iter().any(|kind| INTERRUPTED.contains(kind)) {
        FailureKind::Other
    } else if TLS_MARKERS.iter().any(|marker| causes.contains(marker)) {
        FailureKind::Tls
    } else {
        FailureKind::Other
    };
    ProbeFailure::new(kind, message)
}

// Socket-level interruptions: the peer went away, not the protocol.
const INTERRUPTED: &[io::ErrorKind] = &[
    io::ErrorKind::ConnectionReset,
    io::ErrorKind::ConnectionAborted,
    io::ErrorKind::BrokenPipe,
    io::ErrorKind::UnexpectedEof,
];

const TLS_MARKERS: &[&str] = &[
    "invalid peer certificate",
    "certificate",
    "handshake",
    "received corrupt message",
    "peer is incompatible",
    "alert",
    "tls",
    "ssl",
];

fn looks_like_dns(lowered: &str) -> bool {
    ["dns error", "failed to lookup", "name or service not known", "no such host", "nodename nor servname"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

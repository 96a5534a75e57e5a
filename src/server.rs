// src/server.rs

//! Inbound HTTP surface. Decodes the request, hands it to the `Scanner` and maps
//! the outcome onto a JSON response.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::core::error::ScanError;
use crate::core::knowledge_base::{FindingDetail, assess};
use crate::core::models::{CheckKind, FindingRecord};
use crate::core::scanner::Scanner;

#[derive(Clone)]
pub struct AppState {
    scanner: Arc<Scanner>,
    /// Check served on `POST /`.
    default_check: Option<CheckKind>,
}

impl AppState {
    pub fn new(scanner: Arc<Scanner>, default_check: Option<CheckKind>) -> Self {
        Self { scanner, default_check }
    }
}

// --- Responses ---

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub finding: FindingRecord,
    pub assessment: Option<&'static FindingDetail>,
}

impl From<FindingRecord> for ScanResponse {
    fn from(finding: FindingRecord) -> Self {
        let assessment = assess(&finding.finding);
        Self { finding, assessment }
    }
}

/// One entry of the `POST /scan` response.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CheckOutcome {
    Completed {
        check: CheckKind,
        #[serde(flatten)]
        response: ScanResponse,
    },
    Failed {
        check: CheckKind,
        error: &'static str,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("unknown check `{0}`")]
    UnknownCheck(String),

    #[error("no default check is configured for this service")]
    NoDefaultCheck,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Scan(ScanError::InvalidInput(_)) | ApiError::NoDefaultCheck => StatusCode::BAD_REQUEST,
            ApiError::UnknownCheck(_) => StatusCode::NOT_FOUND,
            ApiError::Scan(ScanError::ProbeTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Scan(ScanError::ProbeUnavailable(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Scan(ScanError::PublishFailure { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Scan(ScanError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Scan(e) => e.code(),
            ApiError::UnknownCheck(_) => "UnknownCheck",
            ApiError::NoDefaultCheck => "NoDefaultCheck",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "Scan request failed.");
        }
        let body = json!({ "error": self.code(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// --- Router ---

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(scan_default))
        .route("/scan", post(scan_all))
        .route("/scan/:check", post(scan_named))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `listen` and serves until Ctrl-C.
pub async fn serve(listen: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    info!(%listen, "Listening for scan requests.");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining in-flight scans."),
        Err(e) => {
            warn!(error = %e, "Could not listen for Ctrl-C; running until killed.");
            std::future::pending::<()>().await;
        }
    }
}

// --- Handlers ---

async fn health_check() -> &'static str {
    "ok"
}

async fn scan_default(State(state): State<AppState>, body: Bytes) -> Result<Json<ScanResponse>, ApiError> {
    let kind = state.default_check.ok_or(ApiError::NoDefaultCheck)?;
    run_one(&state, kind, &body).await
}

async fn scan_named(
    State(state): State<AppState>,
    Path(check): Path<String>,
    body: Bytes,
) -> Result<Json<ScanResponse>, ApiError> {
    let Ok(kind) = CheckKind::from_str(&check) else {
        return Err(ApiError::UnknownCheck(check));
    };
    run_one(&state, kind, &body).await
}

async fn scan_all(State(state): State<AppState>, body: Bytes) -> Result<Json<Vec<CheckOutcome>>, ApiError> {
    let payload = parse_body(&body)?;
    let outcomes = state
        .scanner
        .scan_all(&payload)
        .await?
        .into_iter()
        .map(|(check, outcome)| match outcome {
            Ok(record) => CheckOutcome::Completed { check, response: record.into() },
            Err(e) => CheckOutcome::Failed { check, error: e.code(), message: e.to_string() },
        })
        .collect();
    Ok(Json(outcomes))
}

async fn run_one(state: &AppState, kind: CheckKind, body: &[u8]) -> Result<Json<ScanResponse>, ApiError> {
    let payload = parse_body(body)?;
    let record = state.scanner.scan(kind, &payload).await?;
    Ok(Json(record.into()))
}

fn parse_body(body: &[u8]) -> Result<Value, ScanError> {
    serde_json::from_slice(body).map_err(|e| ScanError::InvalidInput(format!("request body is not valid JSON: {e}")))
}

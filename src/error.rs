//! Error taxonomies.
//!
//! Protocol-facing failures are modelled as small closed enums rather than
//! propagated exceptions, so each failure maps deterministically to an HTTP
//! status or a JSON-RPC error code.  Routing failures (wrong method, wrong
//! path) never reach these types; the axum router answers them with 405/404
//! directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// ── Transport errors ──────────────────────────────────────────────────────────

/// Failures raised by the transport adapters while turning an HTTP request
/// into exactly one HTTP response.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TransportError {
    /// The request body is not valid JSON.
    #[error("could not parse message: {0}")]
    Parse(String),

    /// The body is valid JSON but does not match the JSON-RPC message schema.
    #[error("invalid message: {0}")]
    Validation(String),

    /// The engine went away during the synthetic initialize handshake.
    #[error("initialize handshake with the RPC engine failed")]
    Handshake,

    /// The engine closed its reply stream before producing the one response
    /// owed to the client's request.
    #[error("RPC engine closed the stream before replying")]
    EngineClosed,
}

impl TransportError {
    /// Deterministic status mapping: client faults are 400, engine faults
    /// are 500.
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            TransportError::Parse(_) | TransportError::Validation(_) => StatusCode::BAD_REQUEST,
            TransportError::Handshake | TransportError::EngineClosed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

// ── Upstream errors ───────────────────────────────────────────────────────────

/// Failures talking to the Grafana backend selected for the current request.
///
/// These are surfaced to the MCP client as a JSON-RPC error response
/// correlated to the originating request id; they are never retried here.
#[derive(Debug, thiserror::Error)]
pub(crate) enum UpstreamError {
    /// The context's base URL could not be parsed.
    #[error("invalid Grafana URL: {0}")]
    BadUrl(String),

    /// The outbound HTTP call failed (connect, timeout, protocol).
    #[error("request to Grafana failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Grafana answered with a non-2xx status.
    #[error("Grafana returned status {status}: {detail}")]
    Status { status: u16, detail: String },

    /// Grafana answered 2xx but the body was not the expected JSON.
    #[error("invalid response from Grafana: {0}")]
    Decode(String),
}

// ── Tool errors ───────────────────────────────────────────────────────────────

/// Failures dispatching a `tools/call` request.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ToolError {
    /// JSON-RPC error code for this failure.
    pub(crate) fn code(&self) -> i64 {
        use crate::protocol::error_code;
        match self {
            ToolError::UnknownTool(_) => error_code::METHOD_NOT_FOUND,
            ToolError::InvalidArguments(_) => error_code::INVALID_PARAMS,
            ToolError::Upstream(_) => error_code::INTERNAL_ERROR,
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

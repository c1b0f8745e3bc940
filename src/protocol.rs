//! JSON-RPC 2.0 message types for the MCP wire protocol.
//!
//! A message is one of four shapes: a request (has an `id` and a `method`),
//! a notification (a `method` but no `id`), a response (an `id` and a
//! `result`), or an error response (an `error` object, with the `id` of the
//! request it answers when known).  [`JsonRpcMessage`] models the union as an
//! untagged serde enum; variant order matters because a request body also
//! satisfies the notification shape once its `id` is ignored.
//!
//! Every request eventually pairs with exactly one response sharing its id,
//! unless the connection is aborted; notifications never receive a response.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// MCP protocol revision advertised during the initialize handshake.
pub(crate) const PROTOCOL_VERSION: &str = "2024-11-05";

/// Well-known method names handled by the RPC engine.
pub(crate) mod method {
    pub(crate) const INITIALIZE: &str = "initialize";
    pub(crate) const INITIALIZED: &str = "notifications/initialized";
    pub(crate) const PING: &str = "ping";
    pub(crate) const TOOLS_LIST: &str = "tools/list";
    pub(crate) const TOOLS_CALL: &str = "tools/call";
}

/// Standard JSON-RPC error codes, plus the MCP "server not initialized" code.
pub(crate) mod error_code {
    pub(crate) const PARSE_ERROR: i64 = -32700;
    pub(crate) const METHOD_NOT_FOUND: i64 = -32601;
    pub(crate) const INVALID_PARAMS: i64 = -32602;
    pub(crate) const INTERNAL_ERROR: i64 = -32603;
    pub(crate) const SERVER_NOT_INITIALIZED: i64 = -32002;
}

// ── Version tag ───────────────────────────────────────────────────────────────

/// The `jsonrpc` field.  Only the literal `"2.0"` is accepted; anything else
/// fails deserialisation, which the transports surface as a validation error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Version;

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        if tag == "2.0" {
            Ok(Version)
        } else {
            Err(D::Error::custom(format!(
                "unsupported jsonrpc version '{tag}' (expected \"2.0\")"
            )))
        }
    }
}

// ── Request id ────────────────────────────────────────────────────────────────

/// Correlation id shared by a request and its response.  JSON-RPC allows both
/// numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum RequestId {
    Number(i64),
    String(String),
}

// ── Message union ─────────────────────────────────────────────────────────────

/// One JSON-RPC message.
///
/// Deserialisation tries the variants in declaration order: `Request` must
/// come before `Notification` (a request body also matches the notification
/// shape), and `Response` before `Error` is irrelevant since their required
/// fields are disjoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum JsonRpcMessage {
    Request(Request),
    Notification(Notification),
    Response(Response),
    Error(ErrorResponse),
}

impl JsonRpcMessage {
    /// `true` when the message carries no correlation id and therefore must
    /// not be answered.
    pub(crate) fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification(_))
    }
}

/// A method invocation expecting exactly one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Request {
    pub(crate) jsonrpc: Version,
    pub(crate) id: RequestId,
    pub(crate) method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) params: Option<Value>,
}

/// A fire-and-forget method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Notification {
    pub(crate) jsonrpc: Version,
    pub(crate) method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) params: Option<Value>,
}

/// A successful reply to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Response {
    pub(crate) jsonrpc: Version,
    pub(crate) id: RequestId,
    pub(crate) result: Value,
}

/// A failure reply.  The id is absent when the failing request could not be
/// parsed far enough to recover one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) jsonrpc: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<RequestId>,
    pub(crate) error: ErrorObject,
}

/// The `error` member of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ErrorObject {
    pub(crate) code: i64,
    pub(crate) message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) data: Option<Value>,
}

impl Request {
    pub(crate) fn new(id: RequestId, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Version,
            id,
            method: method.to_owned(),
            params,
        }
    }
}

impl Notification {
    pub(crate) fn new(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: Version,
            method: method.to_owned(),
            params,
        }
    }
}

impl Response {
    pub(crate) fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: Version,
            id,
            result,
        }
    }
}

impl ErrorResponse {
    pub(crate) fn new(id: Option<RequestId>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: Version,
            id,
            error: ErrorObject {
                code,
                message: message.into(),
                data: None,
            },
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

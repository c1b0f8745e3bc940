//! RPC engine.
//!
//! A minimal MCP server session: consumes protocol messages in order from
//! the read end of a stream pair and produces at most one reply per request
//! on the write end.  The engine owns no transport details — stdio, SSE, and
//! the stateless HTTP adapter all drive it through the same channel
//! interface, one [`run`](McpServer::run) call per logical session.
//!
//! The session state machine follows the MCP handshake: an `initialize`
//! request is answered immediately, but every other request is rejected
//! until the client's `notifications/initialized` arrives.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::protocol::{
    error_code, method, ErrorResponse, JsonRpcMessage, Request, Response, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use crate::transport::EngineStreams;

/// The MCP server engine.  Stateless across sessions; per-session state
/// lives on the stack of each [`run`](McpServer::run) call.
pub(crate) struct McpServer {
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    pub(crate) fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Serve one logical session over `streams`.
    ///
    /// Returns when the read channel closes, or when a reply cannot be
    /// delivered because the transport dropped its receiver — both are the
    /// transport's cancellation signal.
    pub(crate) async fn run(&self, mut streams: EngineStreams) {
        let mut initialized = false;
        while let Some(message) = streams.read.recv().await {
            let reply = match message {
                JsonRpcMessage::Request(request) => {
                    Some(self.handle_request(request, initialized).await)
                }
                JsonRpcMessage::Notification(notification) => {
                    if notification.method == method::INITIALIZED {
                        initialized = true;
                    } else {
                        tracing::debug!(method = %notification.method, "ignoring notification");
                    }
                    None
                }
                // A server session never issues requests of its own, so an
                // inbound reply has nothing to correlate with.
                JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => None,
            };

            if let Some(reply) = reply {
                if streams.write.send(reply).await.is_err() {
                    break;
                }
            }
        }
    }

    async fn handle_request(&self, request: Request, initialized: bool) -> JsonRpcMessage {
        match request.method.as_str() {
            method::INITIALIZE => JsonRpcMessage::Response(Response::new(
                request.id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )),
            _ if !initialized => JsonRpcMessage::Error(ErrorResponse::new(
                Some(request.id),
                error_code::SERVER_NOT_INITIALIZED,
                "received request before initialization was complete",
            )),
            method::PING => JsonRpcMessage::Response(Response::new(request.id, json!({}))),
            method::TOOLS_LIST => JsonRpcMessage::Response(Response::new(
                request.id,
                json!({"tools": self.registry.declarations()}),
            )),
            method::TOOLS_CALL => self.handle_tool_call(request).await,
            other => JsonRpcMessage::Error(ErrorResponse::new(
                Some(request.id),
                error_code::METHOD_NOT_FOUND,
                format!("method '{other}' not found"),
            )),
        }
    }

    async fn handle_tool_call(&self, request: Request) -> JsonRpcMessage {
        #[derive(serde::Deserialize)]
        struct CallParams {
            name: String,
            #[serde(default)]
            arguments: Option<Value>,
        }

        let params: CallParams =
            match serde_json::from_value(request.params.unwrap_or_else(|| json!({}))) {
                Ok(params) => params,
                Err(err) => {
                    return JsonRpcMessage::Error(ErrorResponse::new(
                        Some(request.id),
                        error_code::INVALID_PARAMS,
                        format!("invalid tools/call params: {err}"),
                    ));
                }
            };

        match self.registry.call(&params.name, params.arguments).await {
            Ok(value) => {
                let text =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
                JsonRpcMessage::Response(Response::new(
                    request.id,
                    json!({
                        "content": [{"type": "text", "text": text}],
                        "isError": false,
                    }),
                ))
            }
            Err(err) => {
                tracing::warn!(tool = %params.name, "tool call failed: {err}");
                JsonRpcMessage::Error(ErrorResponse::new(
                    Some(request.id),
                    err.code(),
                    err.to_string(),
                ))
            }
        }
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

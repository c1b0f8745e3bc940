//! Stateless HTTP transport.
//!
//! The MCP session model is stateful: a client performs an initialize
//! handshake once per connection, then exchanges requests and notifications.
//! This transport serves the protocol over one-shot `POST /mcp` requests
//! instead, so the adapter replays the handshake against a fresh engine
//! session on every single request to keep the engine's state machine
//! valid, then forwards the client's message and relays the reply.
//!
//! Per request: decode and validate the body (400 on failure, before any
//! engine work), allocate a fresh stream pair, run the bootstrap, send the
//! decoded message, and either return `202 Accepted` immediately (for a
//! notification) or await exactly one reply and return it as the `200`
//! body.  On every exit path the pair is dropped, which closes both
//! channels and lets the engine session terminate.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::HeaderAuthMode;
use crate::error::TransportError;
use crate::protocol::{method, JsonRpcMessage, Notification, Request, RequestId, PROTOCOL_VERSION};
use crate::server::McpServer;

use super::middleware;
use super::{stream_pair, TransportStreams};

/// Correlation id reserved for the synthetic handshake request.
const HANDSHAKE_REQUEST_ID: i64 = 0;

/// Build the stateless HTTP router: `POST /mcp` plus `GET /health`.
///
/// The credential strategy for `/mcp` is fixed here, at startup; `/health`
/// stays outside it so probes need no headers.
pub(crate) fn router(server: Arc<McpServer>, mode: HeaderAuthMode) -> Router {
    let rpc = Router::new()
        .route("/mcp", post(handle_mcp))
        .with_state(server);
    middleware::apply(rpc, mode).route("/health", get(super::health))
}

/// Handle one `POST /mcp` request.
///
/// Wrong methods and paths never reach this handler — the router answers
/// them with 405 and 404.
async fn handle_mcp(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    // Decode in two steps so the two client-fault cases stay distinct:
    // unparseable bytes vs. well-formed JSON that is not a protocol message.
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => return TransportError::Parse(err.to_string()).into_response(),
    };
    let message: JsonRpcMessage = match serde_json::from_value(value) {
        Ok(message) => message,
        Err(err) => return TransportError::Validation(err.to_string()).into_response(),
    };

    match drive_engine(server, message).await {
        Ok(McpReply::Accepted) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Ok(McpReply::Message(reply)) => Json(reply).into_response(),
        Err(err) => {
            tracing::error!("stateless transport error: {err}");
            err.into_response()
        }
    }
}

/// Outcome of one request's exchange with the engine.
enum McpReply {
    /// The message was a notification; nothing comes back.
    Accepted,
    /// The single reply owed to the client's request.
    Message(JsonRpcMessage),
}

/// Run a fresh engine session for one decoded client message.
///
/// The engine future is joined on the handler's own task rather than
/// spawned, so the credential scope entered by the middleware covers every
/// tool call the engine dispatches.  The adapter side drops the stream pair
/// as soon as its outcome is decided — success, early return, or engine
/// fault — which closes both channels and ends the engine future; an engine
/// that dies first closes the reply channel, which the adapter observes as
/// `EngineClosed` instead of hanging.
async fn drive_engine(
    server: Arc<McpServer>,
    message: JsonRpcMessage,
) -> Result<McpReply, TransportError> {
    let (engine_streams, streams) = stream_pair();

    let engine = server.run(engine_streams);
    let adapter = async move {
        let mut streams = streams;
        exchange(&mut streams, message).await
    };

    let ((), outcome) = tokio::join!(engine, adapter);
    outcome
}

/// The bootstrap plus the client message exchange.
async fn exchange(
    streams: &mut TransportStreams,
    message: JsonRpcMessage,
) -> Result<McpReply, TransportError> {
    initialize_session(streams).await?;

    let is_notification = message.is_notification();
    streams
        .to_engine
        .send(message)
        .await
        .map_err(|_| TransportError::EngineClosed)?;

    if is_notification {
        // Fire-and-forget: no reply will ever arrive for this message.
        return Ok(McpReply::Accepted);
    }

    match streams.from_engine.recv().await {
        Some(reply) => Ok(McpReply::Message(reply)),
        None => Err(TransportError::EngineClosed),
    }
}

/// Replay the MCP initialize handshake against a fresh engine session.
///
/// Sends the synthetic `initialize` request, consumes the engine's
/// acknowledgment (it is internal to the adapter and never forwarded to the
/// real client), then sends `notifications/initialized`, for which nothing
/// is awaited.
async fn initialize_session(streams: &mut TransportStreams) -> Result<(), TransportError> {
    let initialize = JsonRpcMessage::Request(Request::new(
        RequestId::Number(HANDSHAKE_REQUEST_ID),
        method::INITIALIZE,
        Some(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
        })),
    ));
    streams
        .to_engine
        .send(initialize)
        .await
        .map_err(|_| TransportError::Handshake)?;

    if streams.from_engine.recv().await.is_none() {
        return Err(TransportError::Handshake);
    }

    let initialized = JsonRpcMessage::Notification(Notification::new(method::INITIALIZED, None));
    streams
        .to_engine
        .send(initialized)
        .await
        .map_err(|_| TransportError::Handshake)?;

    Ok(())
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolCategory;
    use crate::context::GrafanaContext;
    use crate::protocol::error_code;
    use crate::tools::ToolRegistry;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use http_body_util::BodyExt as _;
    use tower::ServiceExt as _;

    fn test_server() -> Arc<McpServer> {
        let defaults = Arc::new(GrafanaContext {
            url: "http://localhost:3000".to_owned(),
            api_key: None,
            access_token: None,
            id_token: None,
        });
        let registry = Arc::new(ToolRegistry::new(
            reqwest::Client::new(),
            defaults,
            &[ToolCategory::Search],
        ));
        Arc::new(McpServer::new(registry))
    }

    fn test_router() -> Router {
        router(test_server(), HeaderAuthMode::Optional)
    }

    async fn post_mcp(app: Router, body: &str) -> (StatusCode, String) {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap();
        let response = app.oneshot(request).await.expect("infallible");
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn a_request_yields_exactly_one_response() {
        let (status, body) = post_mcp(
            test_router(),
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).expect("JSON body");
        assert_eq!(reply["jsonrpc"], "2.0");
        assert_eq!(reply["id"], 1);
        assert!(reply.get("result").is_some());
        assert!(reply.get("error").is_none());
    }

    #[tokio::test]
    async fn a_notification_yields_202_and_no_rpc_body() {
        let (status, body) = post_mcp(
            test_router(),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, "Accepted");
    }

    #[tokio::test]
    async fn an_unparseable_body_is_400() {
        let (status, body) = post_mcp(test_router(), "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("could not parse message"), "got: {body}");
    }

    #[tokio::test]
    async fn a_schema_invalid_body_is_400_with_a_diagnostic() {
        let (status, body) =
            post_mcp(test_router(), r#"{"jsonrpc":"2.0","id":1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("invalid message"), "got: {body}");
    }

    #[tokio::test]
    async fn a_wrong_version_tag_is_schema_invalid() {
        let (status, _body) = post_mcp(
            test_router(),
            r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn the_wrong_http_method_is_405() {
        let request = HttpRequest::builder()
            .method("GET")
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn an_unknown_path_is_404() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/other")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_responds_without_headers() {
        let request = HttpRequest::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Statelessness: the same request body succeeds on repeated fresh
    /// requests; each one independently replays the handshake.
    #[tokio::test]
    async fn identical_sequential_requests_each_complete_the_handshake() {
        let app = test_router();
        let body = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#;
        for _ in 0..2 {
            let (status, reply) = post_mcp(app.clone(), body).await;
            assert_eq!(status, StatusCode::OK);
            let reply: Value = serde_json::from_str(&reply).unwrap();
            assert!(reply["result"]["tools"].is_array());
        }
    }

    /// A client sending its own `initialize` still gets a result — the
    /// synthetic handshake must not wedge the engine for real clients that
    /// follow the stateful flow over HTTP.
    #[tokio::test]
    async fn a_client_initialize_request_is_answered() {
        let (status, body) = post_mcp(
            test_router(),
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"test","version":"0.0.0"}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["id"], 1);
        assert!(reply["result"]["protocolVersion"].is_string());
    }

    /// JSON-RPC level failures still travel as a 200 with an error body
    /// correlated to the request id.
    #[tokio::test]
    async fn an_unknown_tool_is_a_correlated_rpc_error() {
        let (status, body) = post_mcp(
            test_router(),
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"nope"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let reply: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reply["id"], 9);
        assert_eq!(reply["error"]["code"], error_code::METHOD_NOT_FOUND);
    }

    // ── Bootstrap ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn bootstrap_primes_a_fresh_engine_session() {
        let server = test_server();
        let (engine_streams, mut transport) = stream_pair();
        let engine = tokio::spawn(async move { server.run(engine_streams).await });

        initialize_session(&mut transport)
            .await
            .expect("handshake succeeds");

        // The session must now accept ordinary requests.
        transport
            .to_engine
            .send(JsonRpcMessage::Request(Request::new(
                RequestId::Number(1),
                method::TOOLS_LIST,
                None,
            )))
            .await
            .unwrap();
        match transport.from_engine.recv().await.expect("reply") {
            JsonRpcMessage::Response(resp) => assert!(resp.result["tools"].is_array()),
            other => panic!("expected response, got {other:?}"),
        }

        drop(transport);
        engine.await.unwrap();
    }

    #[tokio::test]
    async fn bootstrap_surfaces_a_dead_engine_as_handshake_failure() {
        let (engine_streams, mut transport) = stream_pair();
        drop(engine_streams);
        let result = initialize_session(&mut transport).await;
        assert!(matches!(result, Err(TransportError::Handshake)));
    }

    /// Teardown: once the exchange is over, both channels of the request's
    /// stream pair are closed from the engine's point of view.
    #[tokio::test]
    async fn the_stream_pair_is_closed_after_the_exchange() {
        let (mut engine_streams, streams) = stream_pair();

        // Engine double that answers the handshake and the ping, then keeps
        // its ends alive to observe the adapter-side teardown.
        let engine = tokio::spawn(async move {
            // initialize request → ack
            let first = engine_streams.read.recv().await.expect("initialize");
            let id = match first {
                JsonRpcMessage::Request(req) => req.id,
                other => panic!("expected initialize request, got {other:?}"),
            };
            engine_streams
                .write
                .send(JsonRpcMessage::Response(crate::protocol::Response::new(
                    id,
                    json!({}),
                )))
                .await
                .unwrap();
            // initialized notification
            assert!(engine_streams.read.recv().await.is_some());
            // client ping → reply
            let ping = engine_streams.read.recv().await.expect("client message");
            let id = match ping {
                JsonRpcMessage::Request(req) => req.id,
                other => panic!("expected request, got {other:?}"),
            };
            engine_streams
                .write
                .send(JsonRpcMessage::Response(crate::protocol::Response::new(
                    id,
                    json!({}),
                )))
                .await
                .unwrap();

            // The adapter must now drop its half: reads end, writes fail.
            assert!(engine_streams.read.recv().await.is_none());
            assert!(engine_streams
                .write
                .send(JsonRpcMessage::Response(crate::protocol::Response::new(
                    RequestId::Number(99),
                    json!({}),
                )))
                .await
                .is_err());
        });

        let adapter = async move {
            let mut streams = streams;
            let outcome = exchange(
                &mut streams,
                JsonRpcMessage::Request(Request::new(RequestId::Number(1), method::PING, None)),
            )
            .await;
            assert!(matches!(outcome, Ok(McpReply::Message(_))));
            // `streams` dropped here — the teardown under test.
        };

        adapter.await;
        tokio::time::timeout(std::time::Duration::from_secs(1), engine)
            .await
            .expect("engine double must observe closure")
            .expect("engine double must not panic");
    }
}

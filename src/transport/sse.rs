//! SSE transport.
//!
//! `GET /sse` opens an event stream and a fresh engine session for it.  The
//! first event (`endpoint`) tells the client where to POST its messages:
//! `/messages/?session_id=<uuid>`.  Every engine reply follows as a
//! `message` event on the stream.  `POST /messages/` looks up the session
//! and feeds the client's message to its engine, answering `202 Accepted`.
//!
//! Unlike the stateless HTTP transport, a session here is long-lived: the
//! client performs the initialize handshake itself, over the stream.  The
//! credential middleware wraps connection establishment (`GET /sse`), and
//! the captured context is re-entered around the session's engine task so
//! it covers tool calls for the whole connection.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::stream::{self, Stream, StreamExt as _};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::config::HeaderAuthMode;
use crate::context;
use crate::error::TransportError;
use crate::protocol::JsonRpcMessage;
use crate::server::McpServer;

use super::middleware;
use super::{stream_pair, TransportStreams};

/// Shared state: the engine plus the live sessions' client→engine senders.
#[derive(Clone)]
struct SseState {
    server: Arc<McpServer>,
    sessions: Arc<Mutex<HashMap<Uuid, mpsc::Sender<JsonRpcMessage>>>>,
}

impl SseState {
    fn insert(&self, id: Uuid, sender: mpsc::Sender<JsonRpcMessage>) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
    }

    fn remove(&self, id: &Uuid) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn sender(&self, id: &Uuid) -> Option<mpsc::Sender<JsonRpcMessage>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

/// Build the SSE router: `GET /sse`, `POST /messages/`, `GET /health`.
///
/// The credential strategy wraps only `/sse` — messages are keyed to a
/// session whose context was fixed at connection time.
pub(crate) fn router(server: Arc<McpServer>, mode: HeaderAuthMode) -> Router {
    let state = SseState {
        server,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    let protected = middleware::apply(
        Router::new()
            .route("/sse", get(handle_sse))
            .with_state(state.clone()),
        mode,
    );

    protected
        .route("/messages/", post(handle_message).with_state(state))
        .route("/health", get(super::health))
}

/// Open an event stream and start its engine session.
async fn handle_sse(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (engine_streams, transport) = stream_pair();
    let TransportStreams {
        to_engine,
        from_engine,
    } = transport;

    let session_id = Uuid::new_v4();
    state.insert(session_id, to_engine);
    tracing::debug!(%session_id, "SSE session opened");

    // The middleware's credential scope ends when this handler returns, so
    // the active context is captured here and re-entered around the engine
    // task for the lifetime of the connection.
    let ctx = context::active();
    let server = Arc::clone(&state.server);
    let cleanup = state.clone();
    tokio::spawn(async move {
        match ctx {
            Some(ctx) => context::scope(ctx, server.run(engine_streams)).await,
            None => server.run(engine_streams).await,
        }
        cleanup.remove(&session_id);
        tracing::debug!(%session_id, "SSE session closed");
    });

    let endpoint = stream::once(std::future::ready(
        Event::default()
            .event("endpoint")
            .data(format!("/messages/?session_id={session_id}")),
    ));
    let messages = ReceiverStream::new(from_engine).filter_map(|message| {
        std::future::ready(match serde_json::to_string(&message) {
            Ok(data) => Some(Event::default().event("message").data(data)),
            Err(err) => {
                tracing::warn!("failed to serialise SSE message: {err}");
                None
            }
        })
    });

    Sse::new(endpoint.chain(messages).map(Ok::<Event, Infallible>))
        .keep_alive(KeepAlive::default())
}

#[derive(Debug, serde::Deserialize)]
struct MessageParams {
    session_id: Uuid,
}

/// Deliver one client message to its session's engine.
async fn handle_message(
    State(state): State<SseState>,
    Query(params): Query<MessageParams>,
    body: Bytes,
) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => return TransportError::Parse(err.to_string()).into_response(),
    };
    let message: JsonRpcMessage = match serde_json::from_value(value) {
        Ok(message) => message,
        Err(err) => return TransportError::Validation(err.to_string()).into_response(),
    };

    let Some(sender) = state.sender(&params.session_id) else {
        return (StatusCode::NOT_FOUND, "session not found").into_response();
    };
    if sender.send(message).await.is_err() {
        // The session ended between lookup and delivery.
        return (StatusCode::NOT_FOUND, "session closed").into_response();
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

// ── Unit tests ────────────────────────────────────────────────────────────────

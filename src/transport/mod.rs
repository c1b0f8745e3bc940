//! Transport layer.
//!
//! Three transports serve the same RPC engine:
//!
//! | Transport | Session lifetime               | Module    |
//! |-----------|--------------------------------|-----------|
//! | stdio     | the process                    | [`stdio`] |
//! | SSE       | one `GET /sse` connection      | [`sse`]   |
//! | HTTP      | one `POST /mcp` request        | [`http`]  |
//!
//! Each transport talks to the engine through a [`stream_pair`]: two bounded
//! FIFO channels, one per direction.  Dropping either half of the pair is
//! the closed-stream signal for the other side — a receive on a closed
//! channel resolves to `None` and a send fails, so neither side can hang on
//! a peer that went away.

pub(crate) mod http;
pub(crate) mod middleware;
pub(crate) mod sse;
pub(crate) mod stdio;

use axum::response::IntoResponse;
use tokio::sync::mpsc;

use crate::protocol::JsonRpcMessage;

/// Channel capacity per direction.  A single slot is enough: the protocol is
/// strictly request/reply per session, and senders back off until the peer
/// drains the slot.
const STREAM_CAPACITY: usize = 1;

/// The engine's half of a stream pair.
pub(crate) struct EngineStreams {
    /// Messages from the client.
    pub(crate) read: mpsc::Receiver<JsonRpcMessage>,
    /// Replies to the client.
    pub(crate) write: mpsc::Sender<JsonRpcMessage>,
}

/// The transport's half of a stream pair.
pub(crate) struct TransportStreams {
    /// Sends client messages to the engine.
    pub(crate) to_engine: mpsc::Sender<JsonRpcMessage>,
    /// Receives the engine's replies.
    pub(crate) from_engine: mpsc::Receiver<JsonRpcMessage>,
}

/// Create a fresh pair of unidirectional channels connecting a transport to
/// the RPC engine.  Exclusively owned by the creating session; both
/// directions close when either struct is dropped.
pub(crate) fn stream_pair() -> (EngineStreams, TransportStreams) {
    let (to_engine, read) = mpsc::channel(STREAM_CAPACITY);
    let (write, from_engine) = mpsc::channel(STREAM_CAPACITY);
    (
        EngineStreams { read, write },
        TransportStreams {
            to_engine,
            from_engine,
        },
    )
}

/// Liveness probe shared by the HTTP and SSE routers.
pub(crate) async fn health() -> impl IntoResponse {
    (
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

// ── Unit tests ────────────────────────────────────────────────────────────────

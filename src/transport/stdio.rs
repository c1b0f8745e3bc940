//! stdio transport.
//!
//! Serves a single MCP session over the process's stdin/stdout: one JSON
//! message per line in each direction.  stdout carries nothing but protocol
//! messages — all diagnostics go to stderr via `tracing`.
//!
//! The client drives its own initialize handshake here (the transport is
//! stateful for the life of the process), and requests are routed to the
//! process-default Grafana backend; there are no headers to select another.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::protocol::{error_code, ErrorResponse, JsonRpcMessage};
use crate::server::McpServer;

use super::{stream_pair, TransportStreams};

/// Serve one session until stdin reaches EOF or `token` is cancelled.
pub(crate) async fn run(server: Arc<McpServer>, token: CancellationToken) -> anyhow::Result<()> {
    let (engine_streams, transport) = stream_pair();
    let TransportStreams {
        to_engine,
        mut from_engine,
    } = transport;

    // Both the reader (parse-error replies) and the writer emit whole lines
    // to stdout; the mutex keeps them from interleaving.
    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));

    let engine = server.run(engine_streams);

    let reader = {
        let stdout = Arc::clone(&stdout);
        async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            match serde_json::from_str::<JsonRpcMessage>(&line) {
                                Ok(message) => {
                                    if to_engine.send(message).await.is_err() {
                                        break;
                                    }
                                }
                                Err(err) => {
                                    // Answered in-band: a parse failure has
                                    // no id to correlate with.
                                    let error = JsonRpcMessage::Error(ErrorResponse::new(
                                        None,
                                        error_code::PARSE_ERROR,
                                        format!("could not parse message: {err}"),
                                    ));
                                    if write_line(&stdout, &error).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        // EOF — the client closed the pipe.
                        Ok(None) => break,
                        Err(err) => {
                            tracing::warn!("stdin read error: {err}");
                            break;
                        }
                    },
                }
            }
            // Dropping the sender here closes the engine's read stream.
        }
    };

    let writer = {
        let stdout = Arc::clone(&stdout);
        async move {
            while let Some(message) = from_engine.recv().await {
                if let Err(err) = write_line(&stdout, &message).await {
                    tracing::warn!("stdout write error: {err}");
                    break;
                }
            }
        }
    };

    tracing::info!("grafana-mcp started — transport: stdio");
    let ((), (), ()) = tokio::join!(engine, reader, writer);
    Ok(())
}

async fn write_line(
    stdout: &Mutex<tokio::io::Stdout>,
    message: &JsonRpcMessage,
) -> std::io::Result<()> {
    let json = serde_json::to_string(message).map_err(std::io::Error::other)?;
    let mut out = stdout.lock().await;
    out.write_all(json.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

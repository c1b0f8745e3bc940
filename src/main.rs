//! grafana-mcp — Model Context Protocol server for Grafana.
//!
//! # Usage
//!
//! ```text
//! grafana-mcp serve --config config/grafana-mcp.toml
//! grafana-mcp validate-config --config config/grafana-mcp.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod context;
mod error;
mod protocol;
mod server;
mod tools;
mod transport;

use config::{Config, ListenConfig};
use server::McpServer;
use tools::ToolRegistry;

/// Model Context Protocol server for Grafana.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Start the server on the configured transport.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file and exit without starting the server.
    ValidateConfig {
        /// Path to the TOML configuration file to validate.
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialised first so all startup diagnostics flow through the
    // structured logging pipeline.  Logs go to stderr: stdout is the
    // protocol channel in stdio mode.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => {
            let cfg = Config::load(&config)?;
            serve(cfg).await
        }
        Command::ValidateConfig { config } => {
            Config::load(&config)?;
            tracing::info!(config = %config.display(), "configuration is valid");
            Ok(())
        }
    }
}

/// Wire up the registry and engine, then run the configured transport until
/// shutdown.
async fn serve(cfg: Config) -> Result<()> {
    let http = client::build_http_client()?;
    let defaults = cfg.default_context();
    let registry = Arc::new(ToolRegistry::new(http, defaults, &cfg.tools.enabled));
    let server = Arc::new(McpServer::new(registry));

    let token = CancellationToken::new();
    spawn_shutdown_listener(token.clone());

    match cfg.listen {
        ListenConfig::Stdio => transport::stdio::run(server, token).await,
        ListenConfig::Http { port, header_auth } => {
            tracing::info!(port, "grafana-mcp started — transport: http");
            serve_router(transport::http::router(server, header_auth), port, token).await
        }
        ListenConfig::Sse { port, header_auth } => {
            tracing::info!(port, "grafana-mcp started — transport: sse");
            serve_router(transport::sse::router(server, header_auth), port, token).await
        }
    }
}

/// Bind and serve an axum router until the shutdown token fires.
async fn serve_router(app: axum::Router, port: u16, token: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on port {port}"))?;

    tracing::info!(port, "HTTP listener bound");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("HTTP server error")?;

    Ok(())
}

/// Cancel `token` on SIGINT or, on unix, SIGTERM.
fn spawn_shutdown_listener(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to install SIGINT handler: {err}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(err) => {
                    tracing::warn!("failed to install SIGTERM handler: {err}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("shutdown signal received");
        token.cancel();
    });
}

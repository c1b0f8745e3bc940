//! Shared helpers for integration tests.

use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

/// A temporary directory that owns a config fixture file.
///
/// The [`TempDir`] is kept alive for the lifetime of this struct; dropping it
/// removes all files.
pub struct ConfigFixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl ConfigFixture {
    /// Write `content` to a file named `filename` in a fresh temporary
    /// directory and return a fixture pointing at that file.
    pub fn new(filename: &str, content: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(filename);
        std::fs::write(&path, content).expect("write fixture file");
        Self { _dir: dir, path }
    }
}

/// Bind a TCP listener on `127.0.0.1:0` and return the ephemeral port number
/// chosen by the OS.  The listener is immediately dropped, freeing the port;
/// there is a small TOCTOU window before the server claims it, but this is
/// acceptable in a test environment.
// Each integration test binary compiles common independently, so any helper
// may be unused in a given binary — not a real dead_code issue.
#[allow(dead_code)]
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("local_addr")
        .port()
}

/// A running `grafana-mcp serve` process, killed on drop.
// See free_port comment above.
#[allow(dead_code)]
pub struct ServerProcess {
    child: std::process::Child,
    _fixture: ConfigFixture,
}

impl ServerProcess {
    /// Spawn the server binary with the given TOML config.  Stdout and
    /// stderr are suppressed to keep test output clean.
    #[allow(dead_code)]
    pub fn start(toml: &str) -> Self {
        let fixture = ConfigFixture::new("config.toml", toml);
        let bin = assert_cmd::cargo_bin!("grafana-mcp");
        let child = std::process::Command::new(bin)
            .args(["serve", "--config", fixture.path.to_str().unwrap()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .expect("spawn grafana-mcp");
        Self {
            child,
            _fixture: fixture,
        }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Poll `GET /health` until the server answers 200 or the deadline expires.
#[allow(dead_code)]
pub async fn wait_until_healthy(port: u16) {
    let url = format!("http://127.0.0.1:{port}/health");
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if let Ok(response) = client.get(&url).send().await {
            if response.status().is_success() {
                return;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "server did not become healthy in time"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Serve a mock Grafana API on an ephemeral port and return its base URL.
///
/// The mock identifies itself through its payloads: `/api/datasources`
/// returns a datasource named after `name`, and the Prometheus
/// label-values proxy path returns `{name}_metric`.  Isolation tests assert
/// on those payloads to prove which backend a call reached.
#[allow(dead_code)]
pub async fn spawn_mock_grafana(name: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock grafana");
    let addr = listener.local_addr().expect("local_addr");

    let datasources = get(move || async move { Json(json!([{"id": 1, "name": name}])) });
    let label_values = get(move || async move {
        Json(json!({"status": "success", "data": [format!("{name}_metric")]}))
    });

    let app = Router::new()
        .route("/api/datasources", datasources)
        .route(
            "/api/datasources/proxy/uid/{uid}/api/v1/label/__name__/values",
            label_values,
        );

    tokio::spawn(async move {
        // The mock lives for the duration of the test process.
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{addr}")
}

/// Decode the JSON a tool call returned: tool results arrive as a single
/// text content block holding pretty-printed JSON.
#[allow(dead_code)]
pub fn tool_result_json(reply: &Value) -> Value {
    let text = reply["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("missing text content in reply: {reply}"));
    serde_json::from_str(text).expect("tool result text is JSON")
}

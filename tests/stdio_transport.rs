//! Black-box tests for the stdio transport.
//!
//! The server is spawned as a subprocess with piped stdin/stdout, the way an
//! MCP-capable agent would launch it, and driven through the full stateful
//! handshake.

mod common;

use std::io::{BufRead as _, BufReader, Write as _};
use std::process::{Child, ChildStdin, Command, Stdio};

use common::ConfigFixture;
use serde_json::Value;

const STDIO_CONFIG: &str = r#"
[listen]
transport = "stdio"
"#;

fn spawn_stdio_server() -> (Child, ChildStdin, BufReader<std::process::ChildStdout>, ConfigFixture)
{
    let fixture = ConfigFixture::new("config.toml", STDIO_CONFIG);
    let bin = assert_cmd::cargo_bin!("grafana-mcp");
    let mut child = Command::new(bin)
        .args(["serve", "--config", fixture.path.to_str().unwrap()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn grafana-mcp");
    let stdin = child.stdin.take().expect("stdin is piped");
    let stdout = BufReader::new(child.stdout.take().expect("stdout is piped"));
    (child, stdin, stdout, fixture)
}

fn read_reply(stdout: &mut BufReader<std::process::ChildStdout>) -> Value {
    let mut line = String::new();
    stdout.read_line(&mut line).expect("read reply line");
    serde_json::from_str(line.trim()).unwrap_or_else(|err| panic!("bad reply '{line}': {err}"))
}

#[test]
fn a_full_session_over_stdin_and_stdout() {
    let (mut child, mut stdin, mut stdout, _fixture) = spawn_stdio_server();

    // The client drives the handshake itself on this stateful transport.
    writeln!(
        stdin,
        r#"{{"jsonrpc":"2.0","id":1,"method":"initialize","params":{{"protocolVersion":"2024-11-05","capabilities":{{}},"clientInfo":{{"name":"stdio-test","version":"0.0.0"}}}}}}"#
    )
    .expect("write initialize");
    let reply = read_reply(&mut stdout);
    assert_eq!(reply["id"], 1);
    assert!(reply["result"]["protocolVersion"].is_string());

    writeln!(
        stdin,
        r#"{{"jsonrpc":"2.0","method":"notifications/initialized"}}"#
    )
    .expect("write initialized");

    writeln!(stdin, r#"{{"jsonrpc":"2.0","id":2,"method":"tools/list"}}"#)
        .expect("write tools/list");
    let reply = read_reply(&mut stdout);
    assert_eq!(reply["id"], 2);
    let tools = reply["result"]["tools"].as_array().expect("tools array");
    assert!(!tools.is_empty());

    // EOF ends the session and the process exits cleanly.
    drop(stdin);
    let status = child.wait().expect("wait for exit");
    assert!(status.success(), "server must exit cleanly on EOF");
}

#[test]
fn an_unparseable_line_gets_an_in_band_parse_error() {
    let (mut child, mut stdin, mut stdout, _fixture) = spawn_stdio_server();

    writeln!(stdin, "this is not json").expect("write garbage");
    let reply = read_reply(&mut stdout);
    assert_eq!(reply["error"]["code"], -32700);
    assert!(reply.get("id").is_none());

    // The session survives a parse error.
    writeln!(
        stdin,
        r#"{{"jsonrpc":"2.0","id":1,"method":"initialize","params":{{"protocolVersion":"2024-11-05","capabilities":{{}},"clientInfo":{{"name":"stdio-test","version":"0.0.0"}}}}}}"#
    )
    .expect("write initialize");
    let reply = read_reply(&mut stdout);
    assert_eq!(reply["id"], 1);

    drop(stdin);
    let _ = child.wait();
}

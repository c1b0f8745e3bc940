//! Tempo trace tools, proxied through the Grafana datasource API.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::GrafanaClient;
use crate::error::ToolError;

use super::{tool, ToolDef};

#[derive(Debug, Deserialize)]
struct GetTraceArgs {
    datasource_uid: String,
    trace_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchTracesArgs {
    datasource_uid: String,
    /// TraceQL expression, e.g. `{resource.service.name = "api"}`.
    query: String,
    #[serde(default)]
    limit: Option<u32>,
}

async fn get_trace(client: GrafanaClient, args: GetTraceArgs) -> Result<Value, ToolError> {
    Ok(client
        .datasource_proxy_get(
            &args.datasource_uid,
            &format!("api/traces/{}", args.trace_id),
            &[],
        )
        .await?)
}

async fn search_traces(client: GrafanaClient, args: SearchTracesArgs) -> Result<Value, ToolError> {
    let limit;
    let mut query = vec![("q", args.query.as_str())];
    if let Some(value) = args.limit {
        limit = value.to_string();
        query.push(("limit", limit.as_str()));
    }
    Ok(client
        .datasource_proxy_get(&args.datasource_uid, "api/search", &query)
        .await?)
}

pub(crate) fn register(tools: &mut Vec<ToolDef>) {
    tools.push(tool(
        "get_trace",
        "Fetch a trace by id from a Tempo datasource",
        json!({
            "type": "object",
            "properties": {
                "datasource_uid": {"type": "string", "description": "Uid of the Tempo datasource"},
                "trace_id": {"type": "string", "description": "Hex trace id"},
            },
            "required": ["datasource_uid", "trace_id"],
        }),
        get_trace,
    ));
    tools.push(tool(
        "search_traces",
        "Search traces in a Tempo datasource using TraceQL",
        json!({
            "type": "object",
            "properties": {
                "datasource_uid": {"type": "string", "description": "Uid of the Tempo datasource"},
                "query": {"type": "string", "description": "TraceQL query"},
                "limit": {"type": "integer", "description": "Maximum number of traces to return"},
            },
            "required": ["datasource_uid", "query"],
        }),
        search_traces,
    ));
}

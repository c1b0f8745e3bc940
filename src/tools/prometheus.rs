//! Prometheus query tools, proxied through the Grafana datasource API.
//!
//! All calls go via `/api/datasources/proxy/uid/{uid}/api/v1/...`, so the
//! selected backend's access control applies to every query.

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::GrafanaClient;
use crate::error::ToolError;

use super::{tool, ToolDef};

#[derive(Debug, Deserialize)]
struct ListMetricNamesArgs {
    datasource_uid: String,
    /// Optional regular expression filtering the returned metric names.
    #[serde(default)]
    regex: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    datasource_uid: String,
    expr: String,
    /// RFC 3339 or unix-timestamp evaluation instant; server time when absent.
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryRangeArgs {
    datasource_uid: String,
    expr: String,
    start: String,
    end: String,
    step: String,
}

async fn list_prometheus_metric_names(
    client: GrafanaClient,
    args: ListMetricNamesArgs,
) -> Result<Value, ToolError> {
    let response = client
        .datasource_proxy_get(&args.datasource_uid, "api/v1/label/__name__/values", &[])
        .await?;

    // Prometheus label-values shape: {"status": "success", "data": [...]}.
    let names = response
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let names = match &args.regex {
        Some(pattern) => {
            let regex = Regex::new(pattern)
                .map_err(|err| ToolError::InvalidArguments(format!("bad regex: {err}")))?;
            names
                .into_iter()
                .filter(|name| name.as_str().is_some_and(|name| regex.is_match(name)))
                .collect()
        }
        None => names,
    };

    Ok(Value::Array(names))
}

async fn query_prometheus(client: GrafanaClient, args: QueryArgs) -> Result<Value, ToolError> {
    let mut query = vec![("query", args.expr.as_str())];
    if let Some(time) = &args.time {
        query.push(("time", time));
    }
    Ok(client
        .datasource_proxy_get(&args.datasource_uid, "api/v1/query", &query)
        .await?)
}

async fn query_prometheus_range(
    client: GrafanaClient,
    args: QueryRangeArgs,
) -> Result<Value, ToolError> {
    let query = [
        ("query", args.expr.as_str()),
        ("start", args.start.as_str()),
        ("end", args.end.as_str()),
        ("step", args.step.as_str()),
    ];
    Ok(client
        .datasource_proxy_get(&args.datasource_uid, "api/v1/query_range", &query)
        .await?)
}

pub(crate) fn register(tools: &mut Vec<ToolDef>) {
    tools.push(tool(
        "list_prometheus_metric_names",
        "List metric names in a Prometheus datasource, optionally filtered by a regex",
        json!({
            "type": "object",
            "properties": {
                "datasource_uid": {"type": "string", "description": "Uid of the Prometheus datasource"},
                "regex": {"type": "string", "description": "Regular expression to filter metric names"},
            },
            "required": ["datasource_uid"],
        }),
        list_prometheus_metric_names,
    ));
    tools.push(tool(
        "query_prometheus",
        "Run an instant PromQL query against a Prometheus datasource",
        json!({
            "type": "object",
            "properties": {
                "datasource_uid": {"type": "string", "description": "Uid of the Prometheus datasource"},
                "expr": {"type": "string", "description": "PromQL expression"},
                "time": {"type": "string", "description": "Evaluation instant (RFC 3339 or unix timestamp)"},
            },
            "required": ["datasource_uid", "expr"],
        }),
        query_prometheus,
    ));
    tools.push(tool(
        "query_prometheus_range",
        "Run a PromQL range query against a Prometheus datasource",
        json!({
            "type": "object",
            "properties": {
                "datasource_uid": {"type": "string", "description": "Uid of the Prometheus datasource"},
                "expr": {"type": "string", "description": "PromQL expression"},
                "start": {"type": "string", "description": "Range start (RFC 3339 or unix timestamp)"},
                "end": {"type": "string", "description": "Range end (RFC 3339 or unix timestamp)"},
                "step": {"type": "string", "description": "Query resolution step, e.g. '30s'"},
            },
            "required": ["datasource_uid", "expr", "start", "end", "step"],
        }),
        query_prometheus_range,
    ));
}

//! Dashboard search tools.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::GrafanaClient;
use crate::error::ToolError;

use super::{tool, ToolDef};

#[derive(Debug, Deserialize)]
struct SearchDashboardsArgs {
    #[serde(default)]
    query: Option<String>,
}

async fn search_dashboards(
    client: GrafanaClient,
    args: SearchDashboardsArgs,
) -> Result<Value, ToolError> {
    Ok(client
        .search_dashboards(args.query.as_deref().unwrap_or(""))
        .await?)
}

pub(crate) fn register(tools: &mut Vec<ToolDef>) {
    tools.push(tool(
        "search_dashboards",
        "Search dashboards in the Grafana instance",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Text to match in dashboard titles"},
            },
        }),
        search_dashboards,
    ));
}

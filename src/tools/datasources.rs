//! Datasource lookup tools.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::GrafanaClient;
use crate::error::ToolError;

use super::{tool, ToolDef};

#[derive(Debug, Deserialize)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
struct ByUidArgs {
    uid: String,
}

#[derive(Debug, Deserialize)]
struct ByNameArgs {
    name: String,
}

async fn list_datasources(client: GrafanaClient, _args: NoArgs) -> Result<Value, ToolError> {
    Ok(client.list_datasources().await?)
}

async fn get_datasource_by_uid(client: GrafanaClient, args: ByUidArgs) -> Result<Value, ToolError> {
    Ok(client.datasource_by_uid(&args.uid).await?)
}

async fn get_datasource_by_name(
    client: GrafanaClient,
    args: ByNameArgs,
) -> Result<Value, ToolError> {
    Ok(client.datasource_by_name(&args.name).await?)
}

pub(crate) fn register(tools: &mut Vec<ToolDef>) {
    tools.push(tool(
        "list_datasources",
        "List datasources in the Grafana instance",
        json!({"type": "object", "properties": {}}),
        list_datasources,
    ));
    tools.push(tool(
        "get_datasource_by_uid",
        "Get a datasource by uid",
        json!({
            "type": "object",
            "properties": {
                "uid": {"type": "string", "description": "The uid of the datasource"},
            },
            "required": ["uid"],
        }),
        get_datasource_by_uid,
    ));
    tools.push(tool(
        "get_datasource_by_name",
        "Get a datasource by name",
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "The name of the datasource"},
            },
            "required": ["name"],
        }),
        get_datasource_by_name,
    ));
}

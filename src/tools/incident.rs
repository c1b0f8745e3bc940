//! Grafana Incident tools.
//!
//! The Incident app exposes an RPC-style resource API under
//! `/api/plugins/grafana-incident-app/resources/api/`; every call is a POST
//! with a JSON body.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::GrafanaClient;
use crate::error::ToolError;

use super::{tool, ToolDef};

const DEFAULT_QUERY_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
struct ListIncidentsArgs {
    #[serde(default)]
    limit: Option<u32>,
    /// Filter by status, e.g. `active` or `resolved`.
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateIncidentArgs {
    title: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    room_prefix: Option<String>,
    #[serde(default)]
    is_drill: Option<bool>,
}

async fn list_incidents(client: GrafanaClient, args: ListIncidentsArgs) -> Result<Value, ToolError> {
    let mut query = json!({
        "limit": args.limit.unwrap_or(DEFAULT_QUERY_LIMIT),
        "orderDirection": "DESC",
    });
    if let Some(status) = &args.status {
        query["queryString"] = json!(format!("isdrill:false and status:{status}"));
    }
    Ok(client
        .incident_service("IncidentsService.QueryIncidentPreviews", &json!({"query": query}))
        .await?)
}

async fn create_incident(
    client: GrafanaClient,
    args: CreateIncidentArgs,
) -> Result<Value, ToolError> {
    let body = json!({
        "title": args.title,
        "severity": args.severity,
        "roomPrefix": args.room_prefix,
        "isDrill": args.is_drill.unwrap_or(false),
    });
    Ok(client
        .incident_service("IncidentsService.CreateIncident", &body)
        .await?)
}

pub(crate) fn register(tools: &mut Vec<ToolDef>) {
    tools.push(tool(
        "list_incidents",
        "List incidents in the Grafana Incident app",
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "description": "Maximum number of incidents to return"},
                "status": {"type": "string", "description": "Filter by status: 'active' or 'resolved'"},
            },
        }),
        list_incidents,
    ));
    tools.push(tool(
        "create_incident",
        "Create a new incident in the Grafana Incident app",
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "Incident title"},
                "severity": {"type": "string", "description": "Incident severity"},
                "room_prefix": {"type": "string", "description": "Prefix for the incident chat room"},
                "is_drill": {"type": "boolean", "description": "Whether the incident is a drill"},
            },
            "required": ["title"],
        }),
        create_incident,
    ));
}

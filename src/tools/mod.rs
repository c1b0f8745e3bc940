//! Tool registry.
//!
//! Each tool is a thin, schema-described call to the Grafana HTTP API.  The
//! registry is assembled once at startup from the enabled categories and is
//! read-only afterwards, so it is safe to share across concurrent sessions.
//!
//! Backend resolution happens per call, not per registration: a handler
//! receives a [`GrafanaClient`] bound to the credential context active for
//! the calling request, falling back to the process defaults when the
//! request selected no backend.  Header-selected backends never change which
//! tools are registered.

pub(crate) mod datasources;
pub(crate) mod incident;
pub(crate) mod prometheus;
pub(crate) mod search;
pub(crate) mod tempo;

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Value};

use crate::client::GrafanaClient;
use crate::config::ToolCategory;
use crate::context::{self, GrafanaContext};
use crate::error::ToolError;

/// Type-erased tool handler: takes a client bound to the active backend and
/// the raw `arguments` object.
pub(crate) type ToolHandler =
    Box<dyn Fn(GrafanaClient, Value) -> BoxFuture<'static, Result<Value, ToolError>> + Send + Sync>;

/// One registered tool.
pub(crate) struct ToolDef {
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
    pub(crate) input_schema: Value,
    pub(crate) handler: ToolHandler,
}

/// Wrap a typed handler function into a [`ToolDef`], deserialising the
/// `arguments` object into `A` and reporting mismatches as invalid-params.
pub(crate) fn tool<A, F, Fut>(
    name: &'static str,
    description: &'static str,
    input_schema: Value,
    run: F,
) -> ToolDef
where
    A: serde::de::DeserializeOwned + Send + 'static,
    F: Fn(GrafanaClient, A) -> Fut + Send + Sync + Copy + 'static,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    ToolDef {
        name,
        description,
        input_schema,
        handler: Box::new(move |client, args| {
            Box::pin(async move {
                let args: A = serde_json::from_value(args)
                    .map_err(|err| ToolError::InvalidArguments(err.to_string()))?;
                run(client, args).await
            })
        }),
    }
}

/// The set of tools exposed over MCP.
pub(crate) struct ToolRegistry {
    tools: Vec<ToolDef>,
    http: reqwest::Client,
    defaults: Arc<GrafanaContext>,
}

impl ToolRegistry {
    /// Build the registry for the enabled categories.
    pub(crate) fn new(
        http: reqwest::Client,
        defaults: Arc<GrafanaContext>,
        categories: &[ToolCategory],
    ) -> Self {
        let mut tools = Vec::new();
        for category in categories {
            match category {
                ToolCategory::Search => search::register(&mut tools),
                ToolCategory::Datasource => datasources::register(&mut tools),
                ToolCategory::Prometheus => prometheus::register(&mut tools),
                ToolCategory::Tempo => tempo::register(&mut tools),
                ToolCategory::Incident => incident::register(&mut tools),
            }
        }
        Self {
            tools,
            http,
            defaults,
        }
    }

    /// Tool declarations for `tools/list`.
    pub(crate) fn declarations(&self) -> Value {
        Value::Array(
            self.tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "inputSchema": tool.input_schema,
                    })
                })
                .collect(),
        )
    }

    /// Dispatch a `tools/call`.
    ///
    /// The Grafana client is bound here, at call time, to the credential
    /// context active for the current task — this is the seam that keeps
    /// concurrent requests routed to their own backends.
    pub(crate) async fn call(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_owned()))?;

        let ctx = context::active().unwrap_or_else(|| Arc::clone(&self.defaults));
        tracing::debug!(tool = name, backend = %ctx.url, "dispatching tool call");
        let client = GrafanaClient::new(self.http.clone(), ctx)?;
        let arguments = arguments.unwrap_or_else(|| json!({}));
        (tool.handler)(client, arguments).await
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

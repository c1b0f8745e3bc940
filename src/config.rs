//! Configuration loading and validation.
//!
//! Reads a TOML file from the path supplied via the CLI `--config` flag,
//! applies environment overrides for the Grafana connection, fully validates
//! all fields, and returns a typed [`Config`] value.  The server must never
//! open any network connection before this module returns successfully.
//!
//! # Example
//!
//! ```toml
//! [grafana]
//! url = "http://localhost:3000"
//! api_key = "service-account-token"
//!
//! [listen]
//! transport = "http"
//! port = 8000
//! header_auth = "optional"
//!
//! [tools]
//! enabled = ["search", "datasource", "prometheus"]
//! ```
//!
//! `GRAFANA_URL`, `GRAFANA_API_KEY`, `GRAFANA_ACCESS_TOKEN`, and
//! `GRAFANA_ID_TOKEN` override the corresponding `[grafana]` fields.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use secrecy::SecretString;
use serde::Deserialize;

use crate::context::GrafanaContext;

/// Grafana URL used when neither the config file nor the environment
/// provides one.
const DEFAULT_GRAFANA_URL: &str = "http://localhost:3000";

// ── Config types ──────────────────────────────────────────────────────────────

/// Fully validated server configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Default Grafana backend, used when a request selects none via headers.
    #[serde(default)]
    pub(crate) grafana: GrafanaSection,
    /// Transport to serve the MCP protocol on.
    #[serde(default)]
    pub(crate) listen: ListenConfig,
    /// Tool categories to expose.
    #[serde(default)]
    pub(crate) tools: ToolsConfig,
}

/// The `[grafana]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GrafanaSection {
    #[serde(default = "default_grafana_url")]
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) api_key: Option<SecretString>,
    #[serde(default)]
    pub(crate) access_token: Option<SecretString>,
    #[serde(default)]
    pub(crate) id_token: Option<SecretString>,
}

fn default_grafana_url() -> String {
    DEFAULT_GRAFANA_URL.to_owned()
}

impl Default for GrafanaSection {
    fn default() -> Self {
        Self {
            url: default_grafana_url(),
            api_key: None,
            access_token: None,
            id_token: None,
        }
    }
}

/// The `[listen]` section, tagged by transport.
#[derive(Debug, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub(crate) enum ListenConfig {
    /// Serve a single session over the process's stdin/stdout.
    Stdio,
    /// Serve SSE sessions (`GET /sse` + `POST /messages/`).
    Sse {
        port: u16,
        #[serde(default)]
        header_auth: HeaderAuthMode,
    },
    /// Serve the stateless HTTP transport (`POST /mcp`).
    Http {
        port: u16,
        #[serde(default)]
        header_auth: HeaderAuthMode,
    },
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig::Stdio
    }
}

/// Policy for requests that carry no `X-Grafana-URL` header.
///
/// `optional` leaves the default backend in effect; `required` rejects the
/// request with 403 (fail-closed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum HeaderAuthMode {
    #[default]
    Optional,
    Required,
}

/// The `[tools]` section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ToolsConfig {
    #[serde(default = "all_categories")]
    pub(crate) enabled: Vec<ToolCategory>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: all_categories(),
        }
    }
}

/// Tool categories that can be enabled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ToolCategory {
    Search,
    Datasource,
    Prometheus,
    Tempo,
    Incident,
}

fn all_categories() -> Vec<ToolCategory> {
    vec![
        ToolCategory::Search,
        ToolCategory::Datasource,
        ToolCategory::Prometheus,
        ToolCategory::Tempo,
        ToolCategory::Incident,
    ]
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Config {
    /// Load, override from the environment, and validate a config file.
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GRAFANA_URL") {
            self.grafana.url = url;
        }
        if let Ok(key) = std::env::var("GRAFANA_API_KEY") {
            self.grafana.api_key = Some(SecretString::from(key));
        }
        if let Ok(token) = std::env::var("GRAFANA_ACCESS_TOKEN") {
            self.grafana.access_token = Some(SecretString::from(token));
        }
        if let Ok(token) = std::env::var("GRAFANA_ID_TOKEN") {
            self.grafana.id_token = Some(SecretString::from(token));
        }
    }

    /// Check every field that serde cannot.
    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.grafana.url)
            .with_context(|| format!("invalid grafana.url '{}'", self.grafana.url))?;
        match self.listen {
            ListenConfig::Stdio => {}
            ListenConfig::Sse { port, .. } | ListenConfig::Http { port, .. } => {
                anyhow::ensure!(port != 0, "listen.port must be non-zero");
            }
        }
        anyhow::ensure!(
            !self.tools.enabled.is_empty(),
            "tools.enabled must not be empty"
        );
        Ok(())
    }

    /// The process-wide default credential context, used by requests that
    /// select no backend of their own.
    pub(crate) fn default_context(&self) -> Arc<GrafanaContext> {
        Arc::new(GrafanaContext {
            url: self.grafana.url.clone(),
            api_key: self.grafana.api_key.clone(),
            access_token: self.grafana.access_token.clone(),
            id_token: self.grafana.id_token.clone(),
        })
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

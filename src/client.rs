//! Grafana HTTP client.
//!
//! Thin wrapper around `reqwest` that targets the backend selected by the
//! active [`GrafanaContext`].  TLS uses rustls with the platform's native
//! certificate store so that corporate CAs are trusted without extra
//! configuration.
//!
//! Credentials are injected at the HTTP level: a service-account token or
//! API key becomes a `Bearer` `Authorization` header; otherwise an
//! on-behalf-of pair is forwarded as `X-Access-Token` / `X-Grafana-Id`.
//! The raw values are only exposed here at the injection point and never
//! written to logs or error messages.

use std::sync::Arc;

use anyhow::Context as _;
use reqwest::Method;
use secrecy::ExposeSecret as _;
use serde_json::Value;
use url::Url;

use crate::context::GrafanaContext;
use crate::error::UpstreamError;

/// Upper bound on the error detail captured from a non-2xx Grafana body.
const ERROR_DETAIL_LIMIT: usize = 512;

/// Build the process-wide `reqwest` client with the native root store.
///
/// Individual certificate load failures are logged at `DEBUG` level (they
/// are common in environments with mixed CA stores and are non-actionable
/// unless *all* certificates fail to load).  Startup aborts only when no
/// certificates at all could be loaded.
pub(crate) fn build_http_client() -> anyhow::Result<reqwest::Client> {
    let mut root_store = rustls::RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for error in &certs.errors {
        tracing::debug!("skipped native cert (load error): {error}");
    }
    let mut certs_loaded: usize = 0;
    for cert in certs.certs {
        root_store
            .add(cert)
            .context("failed to add certificate to root store")?;
        certs_loaded += 1;
    }
    tracing::debug!(certs_loaded, "native TLS certificate store loaded");
    if root_store.is_empty() {
        anyhow::bail!("no native root certificates could be loaded");
    }

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    reqwest::ClientBuilder::new()
        .use_preconfigured_tls(tls_config)
        .build()
        .context("failed to build HTTP client")
}

/// A Grafana API client bound to one backend.
///
/// Cheap to construct per tool call: the underlying `reqwest::Client` is
/// shared and `Clone` only bumps its reference count.
pub(crate) struct GrafanaClient {
    http: reqwest::Client,
    base: Url,
    ctx: Arc<GrafanaContext>,
}

impl GrafanaClient {
    /// Bind `http` to the backend described by `ctx`.
    pub(crate) fn new(
        http: reqwest::Client,
        ctx: Arc<GrafanaContext>,
    ) -> Result<Self, UpstreamError> {
        let mut base = Url::parse(&ctx.url)
            .map_err(|err| UpstreamError::BadUrl(format!("{}: {err}", ctx.url)))?;
        // Joining relative API paths replaces the last path segment unless the
        // base ends with a slash.
        if !base.path().ends_with('/') {
            let normalized = format!("{}/", base.path());
            base.set_path(&normalized);
        }
        Ok(Self { http, base, ctx })
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamError> {
        self.base
            .join(path)
            .map_err(|err| UpstreamError::BadUrl(format!("{path}: {err}")))
    }

    /// Start a request with the context's credentials attached.
    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, url);
        if let Some(key) = &self.ctx.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        } else {
            if let Some(token) = &self.ctx.access_token {
                builder = builder.header("X-Access-Token", token.expose_secret());
            }
            if let Some(token) = &self.ctx.id_token {
                builder = builder.header("X-Grafana-Id", token.expose_secret());
            }
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, UpstreamError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let mut detail = body;
            if detail.len() > ERROR_DETAIL_LIMIT {
                detail = detail.chars().take(ERROR_DETAIL_LIMIT).collect();
            }
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                detail,
            });
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|err| UpstreamError::Decode(err.to_string()))
    }

    /// `GET` a Grafana API path (relative, no leading slash) and decode the
    /// JSON body.
    pub(crate) async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, UpstreamError> {
        let url = self.endpoint(path)?;
        let mut builder = self.request(Method::GET, url);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        self.send(builder).await
    }

    /// `POST` a JSON body to a Grafana API path and decode the JSON reply.
    pub(crate) async fn post(&self, path: &str, body: &Value) -> Result<Value, UpstreamError> {
        let url = self.endpoint(path)?;
        self.send(self.request(Method::POST, url).json(body)).await
    }

    // ── Grafana API endpoints used by the tools ───────────────────────────────

    pub(crate) async fn list_datasources(&self) -> Result<Value, UpstreamError> {
        self.get("api/datasources", &[]).await
    }

    pub(crate) async fn datasource_by_uid(&self, uid: &str) -> Result<Value, UpstreamError> {
        self.get(&format!("api/datasources/uid/{uid}"), &[]).await
    }

    pub(crate) async fn datasource_by_name(&self, name: &str) -> Result<Value, UpstreamError> {
        self.get(&format!("api/datasources/name/{name}"), &[]).await
    }

    pub(crate) async fn search_dashboards(&self, query: &str) -> Result<Value, UpstreamError> {
        self.get("api/search", &[("query", query)]).await
    }

    /// `GET` through the datasource proxy, e.g. a Prometheus or Tempo API
    /// exposed at `/api/datasources/proxy/uid/{uid}/...`.
    pub(crate) async fn datasource_proxy_get(
        &self,
        datasource_uid: &str,
        api_path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, UpstreamError> {
        self.get(
            &format!("api/datasources/proxy/uid/{datasource_uid}/{api_path}"),
            query,
        )
        .await
    }

    /// `POST` to a Grafana Incident app resource method, e.g.
    /// `IncidentsService.QueryIncidents`.
    pub(crate) async fn incident_service(
        &self,
        rpc_method: &str,
        body: &Value,
    ) -> Result<Value, UpstreamError> {
        self.post(
            &format!("api/plugins/grafana-incident-app/resources/api/{rpc_method}"),
            body,
        )
        .await
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

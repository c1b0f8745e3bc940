//! Credential-injection middleware.
//!
//! Inspects each inbound request for a Grafana backend selection —
//! `X-Grafana-URL` plus at least one credential header — and, when present,
//! runs the rest of the stack inside a credential scope for that backend.
//! The scope is entered and released around `next.run(...)`, so it covers
//! every future the handler awaits and is torn down on success, error, and
//! panic alike; sibling requests on the same worker threads are unaffected.
//!
//! Two strategies exist for requests without a URL header, and the choice is
//! made once, when the router is built (see [`apply`]):
//!
//! - [`overlay_credentials`]: leave the process-default backend in effect.
//! - [`require_credentials`]: reject with 403 (fail-closed).

use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use secrecy::SecretString;

use crate::config::HeaderAuthMode;
use crate::context::{self, GrafanaContext};

/// Selects the backend; without it no context is activated.
pub(crate) const URL_HEADER: &str = "x-grafana-url";
/// Service-account token or API key.
pub(crate) const API_KEY_HEADER: &str = "x-grafana-api-key";
/// On-behalf-of access token.
pub(crate) const ACCESS_TOKEN_HEADER: &str = "x-access-token";
/// Identity token accompanying the access token.
pub(crate) const ID_TOKEN_HEADER: &str = "x-grafana-id";

// ── Header extraction ─────────────────────────────────────────────────────────

/// Backend selection extracted from request headers.
#[derive(Debug)]
pub(crate) struct HeaderCredentials {
    url: String,
    api_key: Option<SecretString>,
    access_token: Option<SecretString>,
    id_token: Option<SecretString>,
}

impl HeaderCredentials {
    /// Extract a selection from `headers` (names are case-insensitive).
    ///
    /// Returns `None` when the URL header is absent — credential headers on
    /// their own never activate a context.  Header values that are not
    /// valid visible ASCII are treated as absent.
    pub(crate) fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let url = header_value(headers, URL_HEADER)?;
        Some(Self {
            url,
            api_key: header_value(headers, API_KEY_HEADER).map(SecretString::from),
            access_token: header_value(headers, ACCESS_TOKEN_HEADER).map(SecretString::from),
            id_token: header_value(headers, ID_TOKEN_HEADER).map(SecretString::from),
        })
    }

    /// The credential context for this selection.  Tool-enablement flags are
    /// process-wide configuration and are not affected by headers.
    pub(crate) fn into_context(self) -> GrafanaContext {
        GrafanaContext {
            url: self.url,
            api_key: self.api_key,
            access_token: self.access_token,
            id_token: self.id_token,
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

// ── Middleware strategies ─────────────────────────────────────────────────────

/// Header-selected backend when present, process defaults otherwise.
pub(crate) async fn overlay_credentials(request: Request, next: Next) -> Response {
    match HeaderCredentials::from_headers(request.headers()) {
        Some(credentials) => {
            let ctx = Arc::new(credentials.into_context());
            tracing::debug!(backend = %ctx.url, "credential context activated from headers");
            context::scope(ctx, next.run(request)).await
        }
        None => next.run(request).await,
    }
}

/// Fail-closed variant: a request without a backend selection is rejected.
pub(crate) async fn require_credentials(request: Request, next: Next) -> Response {
    match HeaderCredentials::from_headers(request.headers()) {
        Some(credentials) => {
            let ctx = Arc::new(credentials.into_context());
            tracing::debug!(backend = %ctx.url, "credential context activated from headers");
            context::scope(ctx, next.run(request)).await
        }
        None => (
            StatusCode::FORBIDDEN,
            "no Grafana configuration found in request headers",
        )
            .into_response(),
    }
}

/// Wrap `router`'s routes with the strategy selected by `mode`.
///
/// The strategy is fixed when the router is built; it is never swapped at
/// runtime.
pub(crate) fn apply<S>(router: Router<S>, mode: HeaderAuthMode) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    match mode {
        HeaderAuthMode::Optional => router.route_layer(from_fn(overlay_credentials)),
        HeaderAuthMode::Required => router.route_layer(from_fn(require_credentials)),
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

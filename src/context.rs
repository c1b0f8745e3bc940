//! Request-scoped Grafana credential context.
//!
//! Each inbound request may select its own Grafana backend (URL plus
//! credentials) via headers.  The selection is held in a task-local slot
//! entered with [`scope`], so it is visible to every future the request's
//! handler awaits — including tool executions — and is released on every
//! exit path, panics included.  Concurrent requests each hold their own
//! slot; there is no shared mutable state to leak across them.
//!
//! Code that needs the active backend calls [`active`] and falls back to the
//! process-wide defaults when no request-scoped context has been entered.

use std::future::Future;
use std::sync::Arc;

use secrecy::SecretString;

/// The backend a request's tool calls are routed to.
///
/// Credential fields are [`SecretString`]s; their values are only exposed at
/// the header-injection point in the Grafana client and never appear in logs
/// or error messages.
#[derive(Debug, Clone)]
pub(crate) struct GrafanaContext {
    /// Base URL of the Grafana instance.
    pub(crate) url: String,
    /// Service-account token or API key, sent as `Authorization: Bearer`.
    pub(crate) api_key: Option<SecretString>,
    /// On-behalf-of access token, sent as `X-Access-Token`.
    pub(crate) access_token: Option<SecretString>,
    /// Identity token accompanying the access token, sent as `X-Grafana-Id`.
    pub(crate) id_token: Option<SecretString>,
}

tokio::task_local! {
    /// The context entered for the current request's task tree, if any.
    static ACTIVE: Arc<GrafanaContext>;
}

/// Run `fut` with `ctx` as the active context.
///
/// Scopes nest: an inner `scope` shadows the outer context and the outer one
/// is restored when the inner future completes.  Nothing outside the task
/// tree rooted at `fut` can observe `ctx`.
pub(crate) async fn scope<F>(ctx: Arc<GrafanaContext>, fut: F) -> F::Output
where
    F: Future,
{
    ACTIVE.scope(ctx, fut).await
}

/// The context entered for the current task, or `None` when the request
/// carried no backend selection and defaults apply.
pub(crate) fn active() -> Option<Arc<GrafanaContext>> {
    ACTIVE.try_with(Arc::clone).ok()
}

// ── Unit tests ────────────────────────────────────────────────────────────────

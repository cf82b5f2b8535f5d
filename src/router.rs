//! Request classification and routing.
//!
//! [`RequestDispatcher`] runs once per inbound request. A request under one
//! of the reserved prefixes is answered here and never reaches the host
//! application; any other request is handed to instrumentation and
//! continues through the host's own chain.

use axum::response::{Html, IntoResponse, Json, Response};
use futures::FutureExt;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::assets;
use crate::auth::{AuthGate, Authorization, CredentialVerifier};
use crate::collaborators::{
    Collaborators, Instrumentation, MetricsAggregator, MetricsExporter, StatsProvider,
};
use crate::config::{Config, ConfigError, ReservedPaths};
use crate::context::{QueryParams, RequestContext, RequestInfo};
use crate::error::CollaboratorError;
use crate::host::{Interception, Tracking};
use crate::session::{append_cookie, SessionConfig};
use crate::session_storage::in_memory::LocalSessionStore;
use crate::session_storage::shared::{SharedSessionStore, SharedStoreClient};
use crate::session_storage::SessionStore;

/// Header set on protected responses when the caller authenticated in this request cycle
pub const AUTHENTICATED_HEADER: &str = "x-sws-authenticated";

/// The reserved prefixes, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedPath {
    Stats,
    Metrics,
    Logout,
    Ui,
    Dist,
    Prom,
}

impl ReservedPath {
    /// Whether the path sits behind the auth gate.
    pub fn is_protected(self) -> bool {
        matches!(self, ReservedPath::Stats | ReservedPath::Metrics)
    }
}

/// First reserved prefix `path` starts with, in declaration order.
pub fn classify(paths: &ReservedPaths, path: &str) -> Option<ReservedPath> {
    [
        (ReservedPath::Stats, paths.stats.as_str()),
        (ReservedPath::Metrics, paths.metrics.as_str()),
        (ReservedPath::Logout, paths.logout.as_str()),
        (ReservedPath::Ui, paths.ui.as_str()),
        (ReservedPath::Dist, paths.dist.as_str()),
    ]
    .into_iter()
    .chain(paths.prom.as_deref().map(|prom| (ReservedPath::Prom, prom)))
    .find(|(_, prefix)| path.starts_with(prefix))
    .map(|(reserved, _)| reserved)
}

#[derive(Clone)]
pub struct RequestDispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<Config>,
    gate: AuthGate,
    collaborators: Collaborators,
    local_store: Option<LocalSessionStore>,
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("config", &self.inner.config)
            .field("gate", &self.inner.gate)
            .finish_non_exhaustive()
    }
}

impl RequestDispatcher {
    pub fn builder(config: Config) -> DispatcherBuilder {
        DispatcherBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn gate(&self) -> &AuthGate {
        &self.inner.gate
    }

    pub fn classify(&self, path: &str) -> Option<ReservedPath> {
        classify(&self.inner.config.paths, path)
    }

    /// Start the local session sweep. No-op when authentication is off, when
    /// the shared backend is in use, or when it already runs.
    pub fn start(&self) {
        if !self.inner.config.authentication {
            return;
        }
        if let Some(local) = &self.inner.local_store {
            local.start_sweeper(self.inner.config.sweep_interval());
        }
    }

    /// Stop the local session sweep.
    pub fn shutdown(&self) {
        if let Some(local) = &self.inner.local_store {
            local.stop_sweeper();
        }
    }

    /// Classify `request` and either answer it or prepare it to continue.
    ///
    /// Exactly one of the two happens. For a continuing request the
    /// [`RequestContext`] is inserted into the request extensions and the
    /// returned [`Tracking`] must be finished with the host's response.
    pub async fn intercept<B>(&self, request: &mut Request<B>) -> Interception {
        let info = RequestInfo::from_request(request);
        let ctx = Arc::new(RequestContext::from_uri(&info.uri));

        match self.classify(info.uri.path()) {
            Some(reserved) => {
                Interception::Intercepted(self.serve_reserved(reserved, &info, &ctx).await)
            }
            None => {
                request.extensions_mut().insert(Arc::clone(&ctx));
                Interception::Continue(self.track(info, ctx))
            }
        }
    }

    /// Statistics with no query filter.
    pub fn core_stats(&self) -> Result<serde_json::Value, CollaboratorError> {
        let stats = Arc::clone(&self.inner.collaborators.stats);
        std::panic::catch_unwind(AssertUnwindSafe(|| stats.get_stats(&QueryParams::default())))
            .unwrap_or(Err(CollaboratorError::Panicked("stats")))
    }

    /// Metrics as served on the passthrough path.
    pub async fn prom_metrics(&self) -> Result<String, CollaboratorError> {
        let collaborators = &self.inner.collaborators;
        let aggregator = collaborators
            .aggregator
            .as_ref()
            .filter(|_| self.inner.config.aggregate_metrics);

        let export = async {
            match aggregator {
                Some(aggregator) => aggregator.aggregate(collaborators.metrics.as_ref()).await,
                None => collaborators.metrics.export().await,
            }
        };
        AssertUnwindSafe(export)
            .catch_unwind()
            .await
            .unwrap_or(Err(CollaboratorError::Panicked("metrics")))
    }

    async fn serve_reserved(
        &self,
        reserved: ReservedPath,
        info: &RequestInfo,
        ctx: &RequestContext,
    ) -> Response {
        match reserved {
            ReservedPath::Stats | ReservedPath::Metrics => {
                self.serve_protected(reserved, info, ctx).await
            }
            ReservedPath::Logout => self.inner.gate.logout(info).await,
            ReservedPath::Ui => Html(self.inner.collaborators.ui_markup.to_string()).into_response(),
            ReservedPath::Dist => {
                let config = &self.inner.config;
                assets::serve(&config.asset_root, &config.paths.dist, info).await
            }
            ReservedPath::Prom => {
                let body = absorb("metrics", self.prom_metrics().await).unwrap_or_default();
                plain_text(body)
            }
        }
    }

    async fn serve_protected(
        &self,
        reserved: ReservedPath,
        info: &RequestInfo,
        ctx: &RequestContext,
    ) -> Response {
        let cookie = match self.inner.gate.authorize(info, reserved, ctx).await {
            Authorization::Allowed { cookie } => cookie,
            Authorization::Denied(response) => return response,
        };

        let mut response = if reserved == ReservedPath::Stats {
            let stats = Arc::clone(&self.inner.collaborators.stats);
            let snapshot = std::panic::catch_unwind(AssertUnwindSafe(|| stats.get_stats(ctx.query())))
                .unwrap_or(Err(CollaboratorError::Panicked("stats")));
            let snapshot = absorb("stats", snapshot).unwrap_or_else(|| serde_json::json!({}));
            Json(snapshot).into_response()
        } else {
            let export = AssertUnwindSafe(self.inner.collaborators.metrics.export())
                .catch_unwind()
                .await
                .unwrap_or(Err(CollaboratorError::Panicked("metrics")));
            plain_text(absorb("metrics", export).unwrap_or_default())
        };

        if let Some(cookie) = cookie {
            append_cookie(response.headers_mut(), &cookie);
        }
        if ctx.is_authenticated() {
            response
                .headers_mut()
                .insert(AUTHENTICATED_HEADER, HeaderValue::from_static("true"));
        }
        response
    }

    fn track(&self, info: RequestInfo, ctx: Arc<RequestContext>) -> Tracking {
        let instrumentation = Arc::clone(&self.inner.collaborators.instrumentation);
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            instrumentation.process_request(&info, &ctx)
        }))
        .unwrap_or(Err(CollaboratorError::Panicked("instrumentation")));
        absorb("instrumentation", outcome);

        Tracking::new(instrumentation, info, ctx)
    }
}

/// Log a collaborator failure and drop it.
pub(crate) fn absorb<T>(collaborator: &str, result: Result<T, CollaboratorError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(collaborator, "collaborator failed: {}", err);
            None
        }
    }
}

fn plain_text(body: String) -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        body,
    )
        .into_response()
}

/// Builds a [`RequestDispatcher`].
///
/// Without [`with_verifier`](Self::with_verifier), credential login is
/// disabled: protected paths only admit callers holding a live session.
pub struct DispatcherBuilder {
    config: Config,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    shared_store: Option<Arc<dyn SharedStoreClient>>,
    collaborators: Collaborators,
}

impl DispatcherBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            verifier: None,
            shared_store: None,
            collaborators: Collaborators::default(),
        }
    }

    pub fn with_verifier(mut self, verifier: impl CredentialVerifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    /// Keep sessions in a shared key/value service instead of process memory.
    pub fn with_shared_store(mut self, client: Arc<dyn SharedStoreClient>) -> Self {
        self.shared_store = Some(client);
        self
    }

    pub fn with_instrumentation(mut self, instrumentation: impl Instrumentation + 'static) -> Self {
        self.collaborators.instrumentation = Arc::new(instrumentation);
        self
    }

    pub fn with_stats(mut self, stats: impl StatsProvider + 'static) -> Self {
        self.collaborators.stats = Arc::new(stats);
        self
    }

    pub fn with_metrics(mut self, metrics: impl MetricsExporter + 'static) -> Self {
        self.collaborators.metrics = Arc::new(metrics);
        self
    }

    pub fn with_aggregator(mut self, aggregator: impl MetricsAggregator + 'static) -> Self {
        self.collaborators.aggregator = Some(Arc::new(aggregator));
        self
    }

    pub fn with_ui_markup(mut self, markup: impl Into<Arc<str>>) -> Self {
        self.collaborators.ui_markup = markup.into();
        self
    }

    /// Validate the configuration, select the session backend and start the
    /// local sweep when it applies. Must run inside a tokio runtime.
    pub async fn build(self) -> Result<RequestDispatcher, ConfigError> {
        self.config.validate()?;
        let config = Arc::new(self.config);
        let lifetime = config.session_lifetime();

        let (store, local_store): (Arc<dyn SessionStore>, Option<LocalSessionStore>) =
            match self.shared_store {
                Some(client) => (
                    Arc::new(SharedSessionStore::new(
                        client,
                        lifetime,
                        config.backend_timeout(),
                    )),
                    None,
                ),
                None => {
                    let local = LocalSessionStore::with_strict_expiry(lifetime, config.strict_expiry);
                    (Arc::new(local.clone()), Some(local))
                }
            };

        let gate = AuthGate::new(
            config.authentication,
            store,
            self.verifier,
            SessionConfig::from_config(&config),
        );

        let dispatcher = RequestDispatcher {
            inner: Arc::new(Inner {
                config,
                gate,
                collaborators: self.collaborators,
                local_store,
            }),
        };
        dispatcher.start();
        Ok(dispatcher)
    }
}

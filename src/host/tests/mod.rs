mod scenarios;

use axum::body::Body;
use axum::extract::Path;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use base64::Engine;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use tower_cookies::cookie::Cookie;

use crate::auth::{CredentialVerifier, FnVerifier};
use crate::collaborators::{Instrumentation, MetricsExporter, ResponseInfo, StatsProvider};
use crate::config::Config;
use crate::context::{QueryParams, RequestContext, RequestInfo};
use crate::error::CollaboratorError;
use crate::host::plugin::StatsRouterExt;
use crate::router::{DispatcherBuilder, RequestDispatcher};
use crate::session::SESSION_COOKIE;

pub(super) const METRICS_TEXT: &str = "api_all_request_total 3\n";

// Instrumentation double recording what it was told
#[derive(Clone, Default)]
pub struct Recorder {
    requests: Arc<AtomicUsize>,
    responses: Arc<Mutex<Vec<(StatusCode, Option<String>)>>>,
}

impl Recorder {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn responses(&self) -> Vec<(StatusCode, Option<String>)> {
        self.responses.lock().clone()
    }
}

impl Instrumentation for Recorder {
    fn process_request(
        &self,
        request: &RequestInfo,
        ctx: &RequestContext,
    ) -> Result<(), CollaboratorError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if request.uri.path().starts_with("/health") {
            ctx.disable_tracking();
        }
        Ok(())
    }

    fn process_response(
        &self,
        _request: &RequestInfo,
        response: &ResponseInfo<'_>,
        ctx: &RequestContext,
    ) -> Result<(), CollaboratorError> {
        self.responses
            .lock()
            .push((response.status, ctx.route_path().map(str::to_string)));
        Ok(())
    }
}

// Stats double echoing the `fields` filter
pub struct FixedStats;

impl StatsProvider for FixedStats {
    fn get_stats(&self, query: &QueryParams) -> Result<serde_json::Value, CollaboratorError> {
        Ok(serde_json::json!({
            "requests": 3,
            "fields": query.get_all("fields").collect::<Vec<_>>(),
        }))
    }
}

pub struct FixedMetrics;

#[async_trait::async_trait]
impl MetricsExporter for FixedMetrics {
    async fn export(&self) -> Result<String, CollaboratorError> {
        Ok(METRICS_TEXT.to_string())
    }
}

pub fn admin_verifier() -> impl CredentialVerifier {
    FnVerifier::new(|_request, creds| async move {
        Ok(creds.username == "admin" && creds.password == "admin")
    })
}

pub fn authenticated_config() -> Config {
    Config {
        authentication: true,
        ..Config::default()
    }
}

// Builder with the doubles wired in
pub fn builder(config: Config, recorder: &Recorder) -> DispatcherBuilder {
    RequestDispatcher::builder(config)
        .with_verifier(admin_verifier())
        .with_instrumentation(recorder.clone())
        .with_stats(FixedStats)
        .with_metrics(FixedMetrics)
}

async fn user(Path(id): Path<u32>) -> String {
    format!("user {}", id)
}

// Create a host application with the gateway installed
pub fn test_app(dispatcher: RequestDispatcher) -> Router {
    Router::new()
        .route("/api/users/:id", get(user))
        .route("/health", get(|| async { "ok" }))
        .with_stats_gateway(dispatcher)
}

pub fn basic(user_pass: &str) -> (String, String) {
    (
        "Authorization".to_string(),
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(user_pass)
        ),
    )
}

pub fn with_session(sid: &str) -> (String, String) {
    ("Cookie".to_string(), format!("{}={}", SESSION_COOKIE, sid))
}

// Helper function to make a test request
pub async fn make_request(
    app: &Router,
    uri: &str,
    headers: Vec<(String, String)>,
) -> (StatusCode, HeaderMap, String) {
    let mut req_builder = Request::builder().uri(uri);
    for (name, value) in headers {
        req_builder = req_builder.header(name, value);
    }
    let request = req_builder.body(Body::empty()).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();

    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

// The session cookie set on a response, if any
pub fn set_session_cookie(headers: &HeaderMap) -> Option<Cookie<'static>> {
    headers
        .get_all(http::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value.to_string()).ok())
        .find(|cookie| cookie.name() == SESSION_COOKIE)
}

//! Small axum service with the statistics gateway installed.
//!
//! Environment: the `SWS_*` gateway variables, plus `SWS_LISTEN_ADDR`
//! (default `127.0.0.1:3000`), `SWS_ADMIN_USER` / `SWS_ADMIN_PASSWORD` for
//! the login, and `SWS_REDIS_URL` when built with the `redis` feature.

use async_trait::async_trait;
use axum::extract::Path;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use sws_gateway::{
    init_tracing, CollaboratorError, Config, FnVerifier, Instrumentation, MetricsExporter,
    QueryParams, RequestContext, RequestDispatcher, RequestInfo, ResponseInfo, StatsProvider,
    StatsRouterExt,
};

/// Request counts per route and status.
#[derive(Clone, Default)]
struct Counters {
    by_route: Arc<Mutex<BTreeMap<(String, u16), u64>>>,
}

impl Instrumentation for Counters {
    fn process_request(&self, _: &RequestInfo, _: &RequestContext) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn process_response(
        &self,
        request: &RequestInfo,
        response: &ResponseInfo<'_>,
        ctx: &RequestContext,
    ) -> Result<(), CollaboratorError> {
        let route = ctx
            .route_path()
            .unwrap_or_else(|| request.uri.path())
            .to_string();
        *self
            .by_route
            .lock()
            .entry((route, response.status.as_u16()))
            .or_default() += 1;
        Ok(())
    }
}

impl StatsProvider for Counters {
    fn get_stats(&self, _: &QueryParams) -> Result<serde_json::Value, CollaboratorError> {
        let routes: Vec<_> = self
            .by_route
            .lock()
            .iter()
            .map(|((route, status), count)| {
                serde_json::json!({ "route": route, "status": status, "count": count })
            })
            .collect();
        Ok(serde_json::json!({ "routes": routes }))
    }
}

#[async_trait]
impl MetricsExporter for Counters {
    async fn export(&self) -> Result<String, CollaboratorError> {
        let mut text = String::from("# TYPE api_request_total counter\n");
        for ((route, status), count) in self.by_route.lock().iter() {
            text.push_str(&format!(
                "api_request_total{{path=\"{}\",code=\"{}\"}} {}\n",
                route, status, count
            ));
        }
        Ok(text)
    }
}

async fn user(Path(id): Path<u32>) -> String {
    format!("user {}", id)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::from_env()?;
    let addr = std::env::var("SWS_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let admin_user = std::env::var("SWS_ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
    let admin_password = std::env::var("SWS_ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());

    let counters = Counters::default();
    let verifier = FnVerifier::new(move |_request, creds| {
        let admitted = creds.username == admin_user && creds.password == admin_password;
        async move { Ok(admitted) }
    });

    #[allow(unused_mut)]
    let mut builder = RequestDispatcher::builder(config)
        .with_verifier(verifier)
        .with_instrumentation(counters.clone())
        .with_stats(counters.clone())
        .with_metrics(counters);

    #[cfg(feature = "redis")]
    if let Ok(url) = std::env::var("SWS_REDIS_URL") {
        let client = sws_gateway::session_storage::redis::RedisHashClient::connect(&url).await?;
        builder = builder.with_shared_store(Arc::new(client));
    }

    let dispatcher = builder.build().await?;

    let app = Router::new()
        .route("/api/users/:id", get(user))
        .route("/health", get(|| async { "ok" }))
        .with_stats_gateway(dispatcher.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, base = %dispatcher.config().uri_path, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    dispatcher.shutdown();
    Ok(())
}

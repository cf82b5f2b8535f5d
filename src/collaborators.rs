//! Interfaces of the components the gateway hands work to.
//!
//! Statistics aggregation, metric encoding and per-request instrumentation
//! live outside this crate. The dispatcher only calls them, absorbs their
//! failures and keeps serving.

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

use crate::context::{QueryParams, RequestContext, RequestInfo};
use crate::error::CollaboratorError;

/// Response head passed to [`Instrumentation::process_response`].
#[derive(Debug)]
pub struct ResponseInfo<'a> {
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
}

/// Per-request instrumentation (timing, payload capture, counters).
pub trait Instrumentation: Send + Sync {
    /// Called before the host handles a non-reserved request. May call
    /// [`RequestContext::disable_tracking`] to exclude the request.
    fn process_request(
        &self,
        request: &RequestInfo,
        ctx: &RequestContext,
    ) -> Result<(), CollaboratorError>;

    /// Called once when the response is ready, unless tracking was disabled.
    fn process_response(
        &self,
        request: &RequestInfo,
        response: &ResponseInfo<'_>,
        ctx: &RequestContext,
    ) -> Result<(), CollaboratorError>;
}

/// Source of the JSON statistics snapshot.
pub trait StatsProvider: Send + Sync {
    fn get_stats(&self, query: &QueryParams) -> Result<serde_json::Value, CollaboratorError>;
}

/// Plain-text metrics export of this process.
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    async fn export(&self) -> Result<String, CollaboratorError>;
}

/// Combines the exports of several worker processes, e.g. under a process manager.
#[async_trait]
pub trait MetricsAggregator: Send + Sync {
    async fn aggregate(&self, local: &dyn MetricsExporter) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn process_request(&self, _: &RequestInfo, _: &RequestContext) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn process_response(
        &self,
        _: &RequestInfo,
        _: &ResponseInfo<'_>,
        _: &RequestContext,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyStats;

impl StatsProvider for EmptyStats {
    fn get_stats(&self, _: &QueryParams) -> Result<serde_json::Value, CollaboratorError> {
        Ok(serde_json::json!({}))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyMetrics;

#[async_trait]
impl MetricsExporter for EmptyMetrics {
    async fn export(&self) -> Result<String, CollaboratorError> {
        Ok(String::new())
    }
}

/// Everything the dispatcher delegates to.
#[derive(Clone)]
pub struct Collaborators {
    pub instrumentation: Arc<dyn Instrumentation>,
    pub stats: Arc<dyn StatsProvider>,
    pub metrics: Arc<dyn MetricsExporter>,
    pub aggregator: Option<Arc<dyn MetricsAggregator>>,
    pub ui_markup: Arc<str>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            instrumentation: Arc::new(NoopInstrumentation),
            stats: Arc::new(EmptyStats),
            metrics: Arc::new(EmptyMetrics),
            aggregator: None,
            ui_markup: Arc::from(DEFAULT_UI_MARKUP),
        }
    }
}

/// Shell page for the statistics UI. Scripts load from the dist path and
/// call the stats path themselves.
pub const DEFAULT_UI_MARKUP: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>API Statistics</title>
    <link rel="stylesheet" href="dist/css/sws.min.css">
</head>
<body>
    <div id="sws-root"></div>
    <script src="dist/js/sws.min.js"></script>
</body>
</html>
"#;

//! Per-request state shared between the dispatcher, the auth gate and the
//! instrumentation collaborator.

use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, Request, Uri};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Parsed query string. Keeps repeated keys in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Parse the query component of `uri`. A query that does not decode
    /// yields an empty parameter set.
    pub fn from_uri(uri: &Uri) -> Self {
        match uri.query() {
            Some(query) => Self::parse(query),
            None => Self::default(),
        }
    }

    pub fn parse(query: &str) -> Self {
        match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            Ok(pairs) => Self(pairs),
            Err(err) => {
                tracing::debug!("ignoring malformed query string: {}", err);
                Self::default()
            }
        }
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in request order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Snapshot of the request head handed to collaborators and to the
/// verification hook.
#[derive(Clone, Debug)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub received_at: DateTime<Utc>,
}

impl RequestInfo {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            received_at: Utc::now(),
        }
    }
}

/// Ephemeral state for one request.
///
/// Inserted into the request extensions as `Arc<RequestContext>` for
/// non-reserved requests, so handlers and route layers can reach it.
#[derive(Debug)]
pub struct RequestContext {
    query: QueryParams,
    authenticated: AtomicBool,
    tracking_enabled: AtomicBool,
    route_path: OnceLock<String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new(QueryParams::default())
    }
}

impl RequestContext {
    pub fn new(query: QueryParams) -> Self {
        Self {
            query,
            authenticated: AtomicBool::new(false),
            tracking_enabled: AtomicBool::new(true),
            route_path: OnceLock::new(),
        }
    }

    pub fn from_uri(uri: &Uri) -> Self {
        Self::new(QueryParams::from_uri(uri))
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    pub(crate) fn mark_authenticated(&self) {
        self.authenticated.store(true, Ordering::Release);
    }

    pub fn tracking_enabled(&self) -> bool {
        self.tracking_enabled.load(Ordering::Acquire)
    }

    /// Exclude this request from statistics. Called by instrumentation.
    pub fn disable_tracking(&self) {
        self.tracking_enabled.store(false, Ordering::Release);
    }

    /// Route template resolved by the host, when it has one.
    pub fn route_path(&self) -> Option<&str> {
        self.route_path.get().map(String::as_str)
    }

    /// Record the route template. Only the first call has an effect.
    pub fn set_route_path(&self, route: impl Into<String>) {
        let _ = self.route_path.set(route.into());
    }
}

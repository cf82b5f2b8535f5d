//! Router extension for axum applications.
//!
//! Besides intercepting, this binding records the matched route template
//! (`/users/:id`, not `/users/42`) on the request context, and marks the
//! `Authorization` header sensitive so it never shows up in traces.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::Router;
use http::header::AUTHORIZATION;
use std::iter::once;
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;

use crate::host::Interception;
use crate::router::RequestDispatcher;

pub trait StatsRouterExt {
    /// Install the gateway on every route registered so far and on the fallback.
    fn with_stats_gateway(self, dispatcher: RequestDispatcher) -> Self;
}

impl<S> StatsRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_stats_gateway(self, dispatcher: RequestDispatcher) -> Self {
        self.layer(from_fn_with_state(dispatcher, track_route))
            .layer(SetSensitiveRequestHeadersLayer::new(once(AUTHORIZATION)))
    }
}

async fn track_route(
    State(dispatcher): State<RequestDispatcher>,
    mut request: Request,
    next: Next,
) -> Response {
    let tracking = match dispatcher.intercept(&mut request).await {
        Interception::Intercepted(response) => return response,
        Interception::Continue(tracking) => tracking,
    };

    if let Some(matched) = request.extensions().get::<MatchedPath>() {
        tracking.context().set_route_path(matched.as_str());
    }

    let response = next.run(request).await;
    tracking.finish(&response);
    response
}

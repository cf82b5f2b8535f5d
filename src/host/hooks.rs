//! Binding for hosts with separate pre-request and post-response hooks.
//!
//! The pre hook parks the [`Tracking`] in the request extensions. The post
//! hook takes it out again, so firing it twice, or for a request the pre
//! hook answered, reports nothing.

use axum::response::Response;
use http::{Extensions, Request};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::host::{Interception, Tracking};
use crate::router::RequestDispatcher;

/// Request extension carrying the pending tracking between the two hooks.
#[derive(Clone, Debug, Default)]
pub struct TrackingSlot(Arc<Mutex<Option<Tracking>>>);

impl TrackingSlot {
    fn new(tracking: Tracking) -> Self {
        Self(Arc::new(Mutex::new(Some(tracking))))
    }

    pub fn take(&self) -> Option<Tracking> {
        self.0.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.0.lock().is_some()
    }
}

#[derive(Clone, Debug)]
pub struct HookPair {
    dispatcher: RequestDispatcher,
}

impl HookPair {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Pre-request hook. `Some` is the final response; the host must send it
    /// and skip its handler.
    pub async fn on_request<B>(&self, request: &mut Request<B>) -> Option<Response> {
        match self.dispatcher.intercept(request).await {
            Interception::Intercepted(response) => Some(response),
            Interception::Continue(tracking) => {
                request
                    .extensions_mut()
                    .insert(TrackingSlot::new(tracking));
                None
            }
        }
    }

    /// Post-response hook. Records `route` as the matched route template
    /// when given. Returns whether a response was reported.
    pub fn on_response<B>(
        &self,
        extensions: &Extensions,
        route: Option<&str>,
        response: &http::Response<B>,
    ) -> bool {
        let Some(tracking) = extensions.get::<TrackingSlot>().and_then(TrackingSlot::take) else {
            return false;
        };
        if let Some(route) = route {
            tracking.context().set_route_path(route);
        }
        tracking.finish(response);
        true
    }
}

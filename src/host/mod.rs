//! Bindings of the dispatcher into host frameworks.
//!
//! Every binding translates to the same contract: the host hands over a
//! request, [`RequestDispatcher::intercept`](crate::router::RequestDispatcher::intercept)
//! answers it or returns a [`Tracking`], and the binding finishes that
//! tracking with the host's response exactly once.
//!
//! | binding                  | host shape                                   |
//! |--------------------------|----------------------------------------------|
//! | [`middleware`]           | continuation middleware (`Next`)             |
//! | [`layer`]                | tower `Layer`/`Service` wrapping any service |
//! | [`hooks`]                | separate pre-request and post-response hooks |
//! | [`plugin`]               | router extension capturing the route template |

use axum::response::Response;
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

use crate::collaborators::{Instrumentation, ResponseInfo};
use crate::context::{RequestContext, RequestInfo};
use crate::error::CollaboratorError;
use crate::router::absorb;

pub mod hooks;
pub mod layer;
pub mod middleware;
pub mod plugin;

#[cfg(test)]
mod tests;

/// Outcome of [`RequestDispatcher::intercept`](crate::router::RequestDispatcher::intercept).
#[derive(Debug)]
pub enum Interception {
    /// The request was answered here; send this response and stop.
    Intercepted(Response),
    /// The request belongs to the host; finish the tracking with its response.
    Continue(Tracking),
}

impl Interception {
    pub fn intercepted(&self) -> bool {
        matches!(self, Interception::Intercepted(_))
    }
}

/// Pending instrumentation of one continuing request.
///
/// Finishing consumes the value, so a response is reported at most once.
/// Every binding finishes as soon as the host hands back the response head,
/// before the body is streamed; instrumentation sees status and headers,
/// not a completed transfer.
#[must_use = "a continuing request must be finished with its response"]
pub struct Tracking {
    instrumentation: Arc<dyn Instrumentation>,
    request: RequestInfo,
    ctx: Arc<RequestContext>,
}

impl std::fmt::Debug for Tracking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracking")
            .field("method", &self.request.method)
            .field("uri", &self.request.uri)
            .field("tracking_enabled", &self.ctx.tracking_enabled())
            .finish()
    }
}

impl Tracking {
    pub(crate) fn new(
        instrumentation: Arc<dyn Instrumentation>,
        request: RequestInfo,
        ctx: Arc<RequestContext>,
    ) -> Self {
        Self {
            instrumentation,
            request,
            ctx,
        }
    }

    pub fn context(&self) -> &Arc<RequestContext> {
        &self.ctx
    }

    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    pub fn finish<B>(self, response: &http::Response<B>) {
        self.finish_head(response.status(), response.headers());
    }

    /// Report the response head to instrumentation, unless tracking was
    /// disabled while the request was processed.
    pub fn finish_head(self, status: StatusCode, headers: &HeaderMap) {
        if !self.ctx.tracking_enabled() {
            tracing::trace!(uri = %self.request.uri, "tracking disabled for request");
            return;
        }

        let head = ResponseInfo { status, headers };
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.instrumentation
                .process_response(&self.request, &head, &self.ctx)
        }))
        .unwrap_or(Err(CollaboratorError::Panicked("instrumentation")));
        absorb("instrumentation", outcome);
    }
}

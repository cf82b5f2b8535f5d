//! Continuation-style binding for axum.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/api/users", get(users))
//!     .layer(axum::middleware::from_fn_with_state(dispatcher, track));
//! ```

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::host::Interception;
use crate::router::RequestDispatcher;

pub async fn track(
    State(dispatcher): State<RequestDispatcher>,
    mut request: Request,
    next: Next,
) -> Response {
    match dispatcher.intercept(&mut request).await {
        Interception::Intercepted(response) => response,
        Interception::Continue(tracking) => {
            let response = next.run(request).await;
            tracking.finish(&response);
            response
        }
    }
}

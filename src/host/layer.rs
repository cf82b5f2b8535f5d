//! Tower binding for any `Service<Request<_>>`, router or not.

use axum::body::Body;
use axum::response::Response;
use axum::BoxError;
use bytes::Bytes;
use futures::future::BoxFuture;
use http::Request;
use std::task::{Context, Poll};
use tower::Layer;
use tower_service::Service;

use crate::host::Interception;
use crate::router::RequestDispatcher;

#[derive(Clone, Debug)]
pub struct StatsLayer {
    dispatcher: RequestDispatcher,
}

impl StatsLayer {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self { dispatcher }
    }
}

impl<S> Layer<S> for StatsLayer {
    type Service = StatsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StatsService {
            inner,
            dispatcher: self.dispatcher.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatsService<S> {
    inner: S,
    dispatcher: RequestDispatcher,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for StatsService<S>
where
    S: Service<Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: http_body::Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        // the ready service goes into the future, its clone stays behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match dispatcher.intercept(&mut request).await {
                Interception::Intercepted(response) => Ok(response),
                Interception::Continue(tracking) => {
                    let response = inner.call(request).await?;
                    tracking.finish(&response);
                    Ok(response.map(Body::new))
                }
            }
        })
    }
}

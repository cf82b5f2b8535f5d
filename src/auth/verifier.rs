use async_trait::async_trait;
use std::future::Future;

use crate::auth::credentials::Credentials;
use crate::context::RequestInfo;
use crate::error::VerifyError;

/// Caller-supplied credential check.
///
/// `Ok(true)` admits the caller. `Ok(false)`, any `Err` and a panic all deny.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(
        &self,
        request: &RequestInfo,
        credentials: &Credentials,
    ) -> Result<bool, VerifyError>;
}

/// Adapts an async closure into a [`CredentialVerifier`].
///
/// ```rust,ignore
/// let verifier = FnVerifier::new(|_request, creds| async move {
///     Ok(creds.username == "admin" && creds.password == "admin")
/// });
/// ```
pub struct FnVerifier<F> {
    f: F,
}

impl<F> FnVerifier<F> {
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(RequestInfo, Credentials) -> Fut,
        Fut: Future<Output = Result<bool, VerifyError>>,
    {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> CredentialVerifier for FnVerifier<F>
where
    F: Fn(RequestInfo, Credentials) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool, VerifyError>> + Send + 'static,
{
    async fn verify(
        &self,
        request: &RequestInfo,
        credentials: &Credentials,
    ) -> Result<bool, VerifyError> {
        (self.f)(request.clone(), credentials.clone()).await
    }
}

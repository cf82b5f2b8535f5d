//! Authorization gate for the protected reserved paths.
//!
//! Per request the gate resolves to exactly one outcome:
//!
//! 1. A session cookie naming a live session renews it and allows.
//! 2. Otherwise `Basic` credentials are handed to the verification hook; a
//!    positive answer allows and, for the statistics path only, opens a new
//!    session.
//! 3. Anything else denies with `403`.
//!
//! Without a verification hook, step 2 always denies: only existing sessions
//! can get through, and with the local backend no session can ever be created.

use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use http::StatusCode;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tower_cookies::cookie::Cookie;

pub mod credentials;
pub mod verifier;

pub use credentials::Credentials;
pub use verifier::{CredentialVerifier, FnVerifier};

use crate::context::{RequestContext, RequestInfo};
use crate::error::VerifyError;
use crate::router::ReservedPath;
use crate::session::SessionConfig;
use crate::session_storage::SessionStore;

pub const AUTHENTICATION_REQUIRED: &str = "Authentication required";
pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const LOGGED_OUT: &str = "Logged out";

/// Result of [`AuthGate::authorize`].
#[derive(Debug)]
pub enum Authorization {
    /// The request may be served. `cookie` must be set on the response.
    Allowed { cookie: Option<Cookie<'static>> },
    /// The gate has produced the final response.
    Denied(Response),
}

#[derive(Clone)]
pub struct AuthGate {
    enabled: bool,
    store: Arc<dyn SessionStore>,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    session: SessionConfig,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("enabled", &self.enabled)
            .field("store", &self.store)
            .field("verifier", &self.verifier.is_some())
            .field("session", &self.session)
            .finish()
    }
}

impl AuthGate {
    pub fn new(
        enabled: bool,
        store: Arc<dyn SessionStore>,
        verifier: Option<Arc<dyn CredentialVerifier>>,
        session: SessionConfig,
    ) -> Self {
        if enabled && verifier.is_none() {
            tracing::warn!(
                "authentication enabled without a credential verifier; only existing sessions will be accepted"
            );
        }
        Self {
            enabled,
            store,
            verifier,
            session,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.session
    }

    /// Decide whether `request` may reach `target`.
    ///
    /// Marks `ctx` authenticated when access was granted through a session or
    /// through credentials. Store and verifier failures never escape: they
    /// count as "not authenticated".
    pub async fn authorize(
        &self,
        request: &RequestInfo,
        target: ReservedPath,
        ctx: &RequestContext,
    ) -> Authorization {
        if !self.enabled {
            return Authorization::Allowed { cookie: None };
        }

        if let Some(sid) = self.session.session_id(&request.headers) {
            if let Some(cookie) = self.renew(&sid).await {
                ctx.mark_authenticated();
                return Authorization::Allowed {
                    cookie: Some(cookie),
                };
            }
        }

        let Some(credentials) = Credentials::from_headers(&request.headers) else {
            return deny(AUTHENTICATION_REQUIRED);
        };
        let Some(verifier) = self.verifier.as_ref() else {
            return deny(AUTHENTICATION_REQUIRED);
        };

        match verify_once(verifier.as_ref(), request, &credentials).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(username = %credentials.username, "credentials rejected");
                return deny(INVALID_CREDENTIALS);
            }
            Err(err) => {
                tracing::warn!(username = %credentials.username, "credential verifier failed: {}", err);
                return deny(INVALID_CREDENTIALS);
            }
        }

        ctx.mark_authenticated();

        // sessions are only opened for the statistics path
        let cookie = if target == ReservedPath::Stats {
            self.open_session().await
        } else {
            None
        };
        Authorization::Allowed { cookie }
    }

    /// End the session named by the request cookie, if it is live.
    ///
    /// Always answers `200 Logged out`, whether or not a session existed.
    pub async fn logout(&self, request: &RequestInfo) -> Response {
        let mut response = (StatusCode::OK, LOGGED_OUT).into_response();

        let Some(sid) = self.session.session_id(&request.headers) else {
            return response;
        };

        match self.store.is_valid(&sid).await {
            Ok(true) => match self.store.remove(&sid).await {
                Ok(()) => {
                    tracing::debug!("session removed on logout");
                    crate::session::append_cookie(
                        response.headers_mut(),
                        &self.session.removal_cookie(),
                    );
                }
                Err(err) => tracing::warn!("could not remove session on logout: {}", err),
            },
            Ok(false) => {}
            Err(err) => tracing::warn!("session lookup failed on logout: {}", err),
        }

        response
    }

    async fn renew(&self, sid: &str) -> Option<Cookie<'static>> {
        match self.store.is_valid(sid).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                tracing::warn!("session lookup failed, treating request as anonymous: {}", err);
                return None;
            }
        }

        match self.store.put(sid).await {
            Ok(()) => Some(self.session.session_cookie(sid)),
            Err(err) => {
                tracing::warn!("session renewal failed, treating request as anonymous: {}", err);
                None
            }
        }
    }

    async fn open_session(&self) -> Option<Cookie<'static>> {
        let sid = uuid::Uuid::new_v4().to_string();
        match self.store.put(&sid).await {
            Ok(()) => {
                tracing::debug!("session created");
                Some(self.session.session_cookie(&sid))
            }
            Err(err) => {
                tracing::warn!("could not store new session, continuing without one: {}", err);
                None
            }
        }
    }
}

/// Await the verifier exactly once, folding a panic into an error.
async fn verify_once(
    verifier: &dyn CredentialVerifier,
    request: &RequestInfo,
    credentials: &Credentials,
) -> Result<bool, VerifyError> {
    AssertUnwindSafe(verifier.verify(request, credentials))
        .catch_unwind()
        .await
        .unwrap_or(Err(VerifyError::Panicked))
}

fn deny(message: &'static str) -> Authorization {
    Authorization::Denied((StatusCode::FORBIDDEN, message).into_response())
}

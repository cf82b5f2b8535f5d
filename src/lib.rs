//! # sws-gateway
//!
//! A request interception layer that exposes API statistics endpoints on an
//! existing axum or tower application. Requests under a reserved base path
//! (`/swagger-stats` by default) are answered by the gateway; everything else
//! passes through to the host with per-request instrumentation attached.
//!
//! ## Features
//!
//! - Classification of reserved paths (stats, metrics, logout, UI, assets,
//!   optional unauthenticated metrics path)
//! - Cookie sessions with sliding expiry, kept in process memory or in a
//!   shared key/value service
//! - Basic authentication through a caller-supplied verification hook
//! - Bindings for axum middleware, tower layers, pre/post hook hosts and
//!   axum routers
//!
//! ```rust,ignore
//! use sws_gateway::{Config, FnVerifier, RequestDispatcher, StatsRouterExt};
//!
//! let dispatcher = RequestDispatcher::builder(Config::from_env()?)
//!     .with_verifier(FnVerifier::new(|_request, creds| async move {
//!         Ok(creds.username == "admin" && creds.password == "admin")
//!     }))
//!     .build()
//!     .await?;
//!
//! let app = Router::new()
//!     .route("/api/users/:id", get(user))
//!     .with_stats_gateway(dispatcher);
//! ```

mod assets;
pub mod auth;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod router;
pub mod session;
pub mod session_storage;

pub use auth::{AuthGate, Authorization, CredentialVerifier, Credentials, FnVerifier};
pub use collaborators::{
    Collaborators, Instrumentation, MetricsAggregator, MetricsExporter, ResponseInfo,
    StatsProvider,
};
pub use config::{Config, ConfigError, ReservedPaths};
pub use context::{QueryParams, RequestContext, RequestInfo};
pub use error::{CollaboratorError, StoreError, VerifyError};
pub use host::hooks::HookPair;
pub use host::layer::StatsLayer;
pub use host::plugin::StatsRouterExt;
pub use host::{Interception, Tracking};
pub use router::{DispatcherBuilder, RequestDispatcher, ReservedPath};
pub use session_storage::SessionStore;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install a JSON log subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing when a global subscriber is already set.
pub fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

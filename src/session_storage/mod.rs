//! Session id storage.
//!
//! Two interchangeable backends sit behind [`SessionStore`]:
//! - [`in_memory::LocalSessionStore`]: process-local map, expired by a periodic sweep
//! - [`shared::SharedSessionStore`]: a hash in an external key/value service whose
//!   TTL is refreshed on every write
//!
//! Exactly one backend is selected when the dispatcher is built.

use async_trait::async_trait;
use std::fmt::Debug;
use std::ops::Deref;

use crate::error::StoreError;

pub mod in_memory;
pub mod shared;

#[cfg(feature = "redis")]
pub mod redis;

#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Whether `sid` names a live session.
    async fn is_valid(&self, sid: &str) -> Result<bool, StoreError>;

    /// Insert `sid` or push its expiry to now + session lifetime.
    async fn put(&self, sid: &str) -> Result<(), StoreError>;

    /// Drop `sid`. Absent ids are not an error.
    async fn remove(&self, sid: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T, V> SessionStore for T
where
    T: Deref<Target = V> + Send + Sync + Debug,
    V: SessionStore,
{
    async fn is_valid(&self, sid: &str) -> Result<bool, StoreError> {
        self.deref().is_valid(sid).await
    }

    async fn put(&self, sid: &str) -> Result<(), StoreError> {
        self.deref().put(sid).await
    }

    async fn remove(&self, sid: &str) -> Result<(), StoreError> {
        self.deref().remove(sid).await
    }
}

/// Absolute expiry, in epoch milliseconds, for a session renewed now.
pub(crate) fn expiry_from_now(lifetime: std::time::Duration) -> i64 {
    let lifetime = i64::try_from(lifetime.as_millis()).unwrap_or(i64::MAX);
    chrono::Utc::now().timestamp_millis().saturating_add(lifetime)
}

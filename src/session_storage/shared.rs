use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::session_storage::{expiry_from_now, SessionStore};

/// Hash key holding every session id as a field.
pub const SESSION_IDS_KEY: &str = "sessionIDs";

/// The narrow command set the gateway needs from an external key/value
/// service. Implementations map their transport errors to
/// [`StoreError::BackendUnavailable`].
#[async_trait]
pub trait SharedStoreClient: Send + Sync + Debug {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;
}

/// Session store backed by a hash in a shared key/value service.
///
/// Each field value is the session's absolute expiry in epoch milliseconds.
/// The hash TTL is refreshed on every write, so the external store removes
/// the whole collection once no session has been touched for a lifetime.
#[derive(Debug, Clone)]
pub struct SharedSessionStore {
    client: Arc<dyn SharedStoreClient>,
    lifetime: Duration,
    timeout: Duration,
}

impl SharedSessionStore {
    pub fn new(client: Arc<dyn SharedStoreClient>, lifetime: Duration, timeout: Duration) -> Self {
        Self {
            client,
            lifetime,
            timeout,
        }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl SessionStore for SharedSessionStore {
    async fn is_valid(&self, sid: &str) -> Result<bool, StoreError> {
        let value = self
            .bounded(self.client.hget(SESSION_IDS_KEY, sid))
            .await
            .inspect_err(|err| tracing::error!("session lookup failed: {}", err))?;

        Ok(match value.and_then(|v| v.parse::<i64>().ok()) {
            Some(expires_at) => expires_at > chrono::Utc::now().timestamp_millis(),
            None => false,
        })
    }

    async fn put(&self, sid: &str) -> Result<(), StoreError> {
        let expires_at = expiry_from_now(self.lifetime).to_string();
        self.bounded(async {
            self.client.hset(SESSION_IDS_KEY, sid, &expires_at).await?;
            self.client.expire(SESSION_IDS_KEY, self.lifetime).await
        })
        .await
        .inspect_err(|err| tracing::error!("session store failed: {}", err))
    }

    async fn remove(&self, sid: &str) -> Result<(), StoreError> {
        self.bounded(self.client.hdel(SESSION_IDS_KEY, sid))
            .await
            .inspect_err(|err| tracing::error!("session removal failed: {}", err))
    }
}

//! Redis binding for the shared session backend (feature `redis`).

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use crate::error::StoreError;
use crate::session_storage::shared::SharedStoreClient;

#[derive(Clone)]
pub struct RedisHashClient {
    connection: ConnectionManager,
}

impl RedisHashClient {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    /// Open a managed connection to `url`, e.g. `redis://127.0.0.1:6379`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let connection = ConnectionManager::new(client).await.map_err(unavailable)?;
        Ok(Self { connection })
    }
}

impl std::fmt::Debug for RedisHashClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisHashClient").finish_non_exhaustive()
    }
}

fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::BackendUnavailable(err.to_string())
}

#[async_trait]
impl SharedStoreClient for RedisHashClient {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection.clone();
        connection.hget(key, field).await.map_err(unavailable)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection
            .hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(unavailable)
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection
            .hdel::<_, _, ()>(key, field)
            .await
            .map_err(unavailable)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        connection
            .expire::<_, ()>(key, i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
            .await
            .map_err(unavailable)
    }
}

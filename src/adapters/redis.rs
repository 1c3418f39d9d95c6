//! Redis store adapter
//!
//! Implements both store ports over a deadpool-redis connection pool.
//! Every Redis or pool error is reported as `StoreUnavailable`; nothing is
//! retried here.

use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use tracing::debug;

use crate::domain::ports::{CacheStore, ValueStore};
use crate::error::{Error, Result};

/// Redis-backed store
#[derive(Clone, Debug)]
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    /// Create a store over an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a store with a pool built from a `redis://` URL.
    pub fn from_url(url: &str) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Config(format!("Failed to create Redis pool: {}", e)))?;
        Ok(Self::new(pool))
    }

    /// Get a connection from the pool.
    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("Failed to get Redis connection: {}", e)))
    }
}

fn unavailable(op: &str, key: &str, e: impl std::fmt::Display) -> Error {
    Error::StoreUnavailable(format!("{} '{}' failed: {}", op, key, e))
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn set_add(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        let mut conn = self.conn().await?;
        let added: i64 = conn
            .sadd(key, value.as_slice())
            .await
            .map_err(|e| unavailable("SADD", key, e))?;

        debug!(key, added, "SADD");
        Ok(added > 0)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let members: Vec<Vec<u8>> = conn
            .smembers(key)
            .await
            .map_err(|e| unavailable("SMEMBERS", key, e))?;

        debug!(key, count = members.len(), "SMEMBERS");
        Ok(members)
    }

    async fn set_remove(&self, key: &str, value: &[u8]) -> Result<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn
            .srem(key, value)
            .await
            .map_err(|e| unavailable("SREM", key, e))?;
        Ok(removed > 0)
    }
}

#[async_trait]
impl ValueStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        conn.get(key).await.map_err(|e| unavailable("GET", key, e))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value.as_slice())
            .await
            .map_err(|e| unavailable("SET", key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_invalid_url_rejected() {
        assert_matches!(RedisCacheStore::from_url("not a url"), Err(Error::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // nothing listens on port 1
        let store = RedisCacheStore::from_url("redis://127.0.0.1:1").unwrap();
        assert_matches!(
            store.set_members("user:marketing:0").await,
            Err(Error::StoreUnavailable(_))
        );
    }

    #[test]
    fn test_unreachable_value_store_is_unavailable() {
        let store = RedisCacheStore::from_url("redis://127.0.0.1:1").unwrap();
        assert_matches!(
            tokio_test::block_on(ValueStore::get(&store, "compare:json")),
            Err(Error::StoreUnavailable(_))
        );
    }
}

//! Redis cache store.

use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult};
use crate::keyspace::{self, Keyspace};
use crate::traits::CacheStore;
use async_trait::async_trait;
use redis::Client;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Cache store backed by a single Redis server.
///
/// All commands go through one multiplexed [`ConnectionManager`], which
/// reconnects on its own after a network failure; clones share it. Entry
/// values, tag sets, and per-key tag records all live under the configured
/// key prefix.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    keyspace: Keyspace,
    operation_timeout: Duration,
}

impl RedisCache {
    /// Connect to the configured server.
    ///
    /// The configuration is validated and the server is pinged before this
    /// returns, both bounded by the configured connection timeout, so a
    /// misconfigured or unreachable cache fails here rather than on first
    /// use.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagcache::{RedisCache, RedisConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), tagcache::CacheError> {
    ///     let cache = RedisCache::new(RedisConfig::new().with_host("localhost")).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: RedisConfig) -> CacheResult<Self> {
        config.validate()?;

        let client =
            Client::open(config.url()).map_err(|e| CacheError::Connection(e.to_string()))?;

        let connection = keyspace::timed(config.connection_timeout, async {
            ConnectionManager::new(client)
                .await
                .map_err(|e| CacheError::Connection(e.to_string()))
        })
        .await?;

        {
            let mut conn = connection.clone();
            keyspace::timed(config.connection_timeout, keyspace::ping(&mut conn)).await?;
        }

        info!(
            host = %config.host,
            port = config.port,
            database = config.database,
            "Redis cache connected"
        );

        Ok(Self {
            connection,
            keyspace: Keyspace::new(config.key_prefix),
            operation_timeout: config.operation_timeout,
        })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn set_json(
        &self,
        key: &str,
        value: String,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        keyspace::timed(
            self.operation_timeout,
            keyspace::store(&mut conn, &self.keyspace, key, value, tags, ttl),
        )
        .await
    }

    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        keyspace::timed(
            self.operation_timeout,
            keyspace::fetch(&mut conn, &self.keyspace, key),
        )
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        keyspace::timed(
            self.operation_timeout,
            keyspace::remove(&mut conn, &self.keyspace, key),
        )
        .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        keyspace::timed(
            self.operation_timeout,
            keyspace::contains(&mut conn, &self.keyspace, key),
        )
        .await
    }

    async fn get_all_json(&self) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.connection.clone();
        keyspace::timed(
            self.operation_timeout,
            keyspace::fetch_all(&mut conn, &self.keyspace),
        )
        .await
    }

    async fn get_by_tag_json(&self, tag: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.connection.clone();
        keyspace::timed(
            self.operation_timeout,
            keyspace::fetch_by_tag(&mut conn, &self.keyspace, tag),
        )
        .await
    }

    async fn delete_by_tag(&self, tag: &str) -> CacheResult<usize> {
        let mut conn = self.connection.clone();
        keyspace::timed(
            self.operation_timeout,
            keyspace::remove_by_tag(&mut conn, &self.keyspace, tag),
        )
        .await
    }
}

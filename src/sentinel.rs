//! Sentinel-backed Redis cache store.

use crate::config::SentinelConfig;
use crate::error::{CacheError, CacheResult};
use crate::keyspace::{self, Keyspace};
use crate::traits::CacheStore;
use async_trait::async_trait;
use redis::RedisConnectionInfo;
use redis::aio::MultiplexedConnection;
use redis::sentinel::{SentinelClient, SentinelNodeConnectionInfo, SentinelServerType};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Cache store backed by a Redis deployment under Sentinel failover.
///
/// The sentinel client asks the sentinel nodes for the current master and
/// connects to it per operation, so a failover needs no handling here: the
/// next operation simply lands on the newly promoted master.
///
/// Every command goes to the master, reads included. Read paths prune stale
/// tag references as they go, and a replica would refuse those writes.
#[derive(Clone)]
pub struct SentinelCache {
    client: Arc<Mutex<SentinelClient>>,
    keyspace: Keyspace,
    operation_timeout: Duration,
}

// Manual impl: `SentinelClient` does not implement `Debug`.
impl fmt::Debug for SentinelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentinelCache")
            .field("keyspace", &self.keyspace)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl SentinelCache {
    /// Connect via the configured sentinel nodes.
    ///
    /// Master discovery runs once here, bounded by the connection timeout,
    /// so an unreachable or misnamed service fails at construction.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagcache::{SentinelCache, SentinelConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), tagcache::CacheError> {
    ///     let config = SentinelConfig::new(
    ///         vec!["10.0.0.1:26379".to_string(), "10.0.0.2:26379".to_string()],
    ///         "mymaster",
    ///     );
    ///     let cache = SentinelCache::new(config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: SentinelConfig) -> CacheResult<Self> {
        config.validate()?;

        let mut redis_info = RedisConnectionInfo::default().set_db(i64::from(config.database));
        if let Some(password) = config.password.clone() {
            redis_info = redis_info.set_password(password);
        }
        let node_info =
            SentinelNodeConnectionInfo::default().set_redis_connection_info(redis_info);

        let mut client = SentinelClient::build(
            config.sentinel_urls(),
            config.service_name.clone(),
            Some(node_info),
            SentinelServerType::Master,
        )
        .map_err(|e| CacheError::Connection(e.to_string()))?;

        let mut conn = keyspace::timed(config.connection_timeout, async {
            client
                .get_async_connection()
                .await
                .map_err(|e| CacheError::Connection(e.to_string()))
        })
        .await?;
        keyspace::timed(config.connection_timeout, keyspace::ping(&mut conn)).await?;

        info!(
            service = %config.service_name,
            sentinels = config.sentinels.len(),
            "Redis sentinel cache connected"
        );

        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            keyspace: Keyspace::new(config.key_prefix),
            operation_timeout: config.operation_timeout,
        })
    }

    /// Connection to the current master, via sentinel discovery.
    async fn master(&self) -> CacheResult<MultiplexedConnection> {
        let mut client = self.client.lock().await;
        client
            .get_async_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for SentinelCache {
    async fn set_json(
        &self,
        key: &str,
        value: String,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        keyspace::timed(self.operation_timeout, async {
            let mut conn = self.master().await?;
            keyspace::store(&mut conn, &self.keyspace, key, value, tags, ttl).await
        })
        .await
    }

    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        keyspace::timed(self.operation_timeout, async {
            let mut conn = self.master().await?;
            keyspace::fetch(&mut conn, &self.keyspace, key).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        keyspace::timed(self.operation_timeout, async {
            let mut conn = self.master().await?;
            keyspace::remove(&mut conn, &self.keyspace, key).await
        })
        .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        keyspace::timed(self.operation_timeout, async {
            let mut conn = self.master().await?;
            keyspace::contains(&mut conn, &self.keyspace, key).await
        })
        .await
    }

    async fn get_all_json(&self) -> CacheResult<HashMap<String, String>> {
        keyspace::timed(self.operation_timeout, async {
            let mut conn = self.master().await?;
            keyspace::fetch_all(&mut conn, &self.keyspace).await
        })
        .await
    }

    async fn get_by_tag_json(&self, tag: &str) -> CacheResult<HashMap<String, String>> {
        keyspace::timed(self.operation_timeout, async {
            let mut conn = self.master().await?;
            keyspace::fetch_by_tag(&mut conn, &self.keyspace, tag).await
        })
        .await
    }

    async fn delete_by_tag(&self, tag: &str) -> CacheResult<usize> {
        keyspace::timed(self.operation_timeout, async {
            let mut conn = self.master().await?;
            keyspace::remove_by_tag(&mut conn, &self.keyspace, tag).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_sentinel_fails_at_construction() {
        // Port 1 refuses immediately, so no sentinel has to be running.
        let config = SentinelConfig::new(vec!["127.0.0.1:1".to_string()], "mymaster");
        let err = SentinelCache::new(config).await.unwrap_err();

        assert!(matches!(err, CacheError::Connection(_) | CacheError::Timeout));
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_connecting() {
        let config = SentinelConfig::new(Vec::new(), "mymaster");
        let err = SentinelCache::new(config).await.unwrap_err();

        assert!(matches!(err, CacheError::Config(_)));
    }
}

//! The cache facade: backend selection plus typed (de)serialization.

use crate::config::{BackendKind, CacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::memory::MemoryCache;
use crate::traits::CacheStore;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::time::Duration;

#[cfg(feature = "redis")]
use crate::redis_cache::RedisCache;
#[cfg(feature = "redis")]
use crate::sentinel::SentinelCache;

/// The configured store, one of a closed set.
#[derive(Clone)]
enum Store {
    Memory(MemoryCache),
    #[cfg(feature = "redis")]
    Redis(RedisCache),
    #[cfg(feature = "redis")]
    Sentinel(SentinelCache),
}

/// Tag-aware cache over a configurable backend.
///
/// Values are serialized to JSON on the way in and deserialized on the way
/// out; the choice of backend changes where entries live, not what any
/// operation means. Tag semantics are uniform across backends: an overwrite
/// replaces the entry's tag set, a tag with no remaining keys disappears,
/// and a missing entry is `None`/`false`, never an error.
///
/// Cloning is cheap and clones share the underlying store and connections.
/// Connections are released when the last clone is dropped.
///
/// # Examples
///
/// ```
/// use tagcache::Cache;
///
/// #[tokio::main]
/// async fn main() -> Result<(), tagcache::CacheError> {
///     let cache = Cache::memory();
///
///     cache.set("user:1", &"Alice", &["users"], None).await?;
///     let name: Option<String> = cache.get("user:1").await?;
///     assert_eq!(name.as_deref(), Some("Alice"));
///
///     cache.delete_by_tag("users").await?;
///     assert!(!cache.exists("user:1").await?);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Cache {
    store: Store,
}

impl Cache {
    /// Connect the backend selected by `config`.
    ///
    /// Parameters are validated and networked backends are reached before
    /// this returns, so a misconfigured cache fails here rather than on
    /// first use.
    pub async fn connect(config: CacheConfig) -> CacheResult<Self> {
        let store = match config {
            CacheConfig::Memory => Store::Memory(MemoryCache::new()),
            #[cfg(feature = "redis")]
            CacheConfig::Redis(config) => Store::Redis(RedisCache::new(config).await?),
            #[cfg(feature = "redis")]
            CacheConfig::RedisSentinel(config) => {
                Store::Sentinel(SentinelCache::new(config).await?)
            }
            #[cfg(not(feature = "redis"))]
            CacheConfig::Redis(_) | CacheConfig::RedisSentinel(_) => {
                return Err(CacheError::Config(
                    "redis support is not compiled in; enable the `redis` feature".to_string(),
                ));
            }
        };
        Ok(Self { store })
    }

    /// Process-local cache. Infallible, and never accepts a TTL.
    pub fn memory() -> Self {
        Self {
            store: Store::Memory(MemoryCache::new()),
        }
    }

    /// Which backend this cache talks to.
    pub fn backend_kind(&self) -> BackendKind {
        match &self.store {
            Store::Memory(_) => BackendKind::Memory,
            #[cfg(feature = "redis")]
            Store::Redis(_) => BackendKind::Redis,
            #[cfg(feature = "redis")]
            Store::Sentinel(_) => BackendKind::RedisSentinel,
        }
    }

    /// Store a value under `key`, replacing the entry's tag set with `tags`.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - Any serializable value
    /// * `tags` - Full tag set for the entry; an empty slice clears all tags
    /// * `ttl` - Optional time-to-live (refused by the memory backend)
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.store.set_json(key, json, tags, ttl).await
    }

    /// Get a typed value, or `None` if the key has no live entry.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        if let Some(json) = self.store.get_json(key).await? {
            let value: T = serde_json::from_str(&json)
                .map_err(|e| CacheError::Deserialization(e.to_string()))?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    /// Delete an entry and unlink it from every tag.
    ///
    /// Returns whether the entry existed.
    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.store.delete(key).await
    }

    /// Check whether `key` has a live entry.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.store.exists(key).await
    }

    /// Get every entry in the cache, keyed by cache key.
    pub async fn get_all<T: DeserializeOwned>(&self) -> CacheResult<HashMap<String, T>> {
        decode_map(self.store.get_all_json().await?)
    }

    /// Get every entry carrying `tag`. Unknown tags yield an empty map.
    pub async fn get_by_tag<T: DeserializeOwned>(
        &self,
        tag: &str,
    ) -> CacheResult<HashMap<String, T>> {
        decode_map(self.store.get_by_tag_json(tag).await?)
    }

    /// Delete every entry carrying `tag`; returns how many were removed.
    ///
    /// Best-effort: every key in the tag's set is attempted, and the first
    /// failure (if any) is surfaced after the full pass.
    pub async fn delete_by_tag(&self, tag: &str) -> CacheResult<usize> {
        self.store.delete_by_tag(tag).await
    }
}

fn decode_map<T: DeserializeOwned>(
    entries: HashMap<String, String>,
) -> CacheResult<HashMap<String, T>> {
    let mut result = HashMap::with_capacity(entries.len());
    for (key, json) in entries {
        let value: T = serde_json::from_str(&json)
            .map_err(|e| CacheError::Deserialization(e.to_string()))?;
        result.insert(key, value);
    }
    Ok(result)
}

/// [`Cache`] satisfies the store contract itself, so it can stand wherever a
/// single backend would.
#[async_trait]
impl CacheStore for Cache {
    async fn set_json(
        &self,
        key: &str,
        value: String,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        self.store.set_json(key, value, tags, ttl).await
    }

    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        self.store.get_json(key).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.store.delete(key).await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.store.exists(key).await
    }

    async fn get_all_json(&self) -> CacheResult<HashMap<String, String>> {
        self.store.get_all_json().await
    }

    async fn get_by_tag_json(&self, tag: &str) -> CacheResult<HashMap<String, String>> {
        self.store.get_by_tag_json(tag).await
    }

    async fn delete_by_tag(&self, tag: &str) -> CacheResult<usize> {
        self.store.delete_by_tag(tag).await
    }
}

#[async_trait]
impl CacheStore for Store {
    async fn set_json(
        &self,
        key: &str,
        value: String,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        match self {
            Store::Memory(store) => store.set_json(key, value, tags, ttl).await,
            #[cfg(feature = "redis")]
            Store::Redis(store) => store.set_json(key, value, tags, ttl).await,
            #[cfg(feature = "redis")]
            Store::Sentinel(store) => store.set_json(key, value, tags, ttl).await,
        }
    }

    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            Store::Memory(store) => store.get_json(key).await,
            #[cfg(feature = "redis")]
            Store::Redis(store) => store.get_json(key).await,
            #[cfg(feature = "redis")]
            Store::Sentinel(store) => store.get_json(key).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        match self {
            Store::Memory(store) => store.delete(key).await,
            #[cfg(feature = "redis")]
            Store::Redis(store) => store.delete(key).await,
            #[cfg(feature = "redis")]
            Store::Sentinel(store) => store.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        match self {
            Store::Memory(store) => store.exists(key).await,
            #[cfg(feature = "redis")]
            Store::Redis(store) => store.exists(key).await,
            #[cfg(feature = "redis")]
            Store::Sentinel(store) => store.exists(key).await,
        }
    }

    async fn get_all_json(&self) -> CacheResult<HashMap<String, String>> {
        match self {
            Store::Memory(store) => store.get_all_json().await,
            #[cfg(feature = "redis")]
            Store::Redis(store) => store.get_all_json().await,
            #[cfg(feature = "redis")]
            Store::Sentinel(store) => store.get_all_json().await,
        }
    }

    async fn get_by_tag_json(&self, tag: &str) -> CacheResult<HashMap<String, String>> {
        match self {
            Store::Memory(store) => store.get_by_tag_json(tag).await,
            #[cfg(feature = "redis")]
            Store::Redis(store) => store.get_by_tag_json(tag).await,
            #[cfg(feature = "redis")]
            Store::Sentinel(store) => store.get_by_tag_json(tag).await,
        }
    }

    async fn delete_by_tag(&self, tag: &str) -> CacheResult<usize> {
        match self {
            Store::Memory(store) => store.delete_by_tag(tag).await,
            #[cfg(feature = "redis")]
            Store::Redis(store) => store.delete_by_tag(tag).await,
            #[cfg(feature = "redis")]
            Store::Sentinel(store) => store.delete_by_tag(tag).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        active: bool,
    }

    fn alice() -> User {
        User {
            name: "Alice".to_string(),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_typed_roundtrip() {
        let cache = Cache::memory();

        cache.set("user:1", &alice(), &["users"], None).await.unwrap();

        let user: Option<User> = cache.get("user:1").await.unwrap();
        assert_eq!(user, Some(alice()));

        let missing: Option<User> = cache.get("user:2").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_connect_memory() {
        let cache = Cache::connect(CacheConfig::memory()).await.unwrap();
        assert_eq!(cache.backend_kind(), BackendKind::Memory);

        cache.set("k", &1u32, &[], None).await.unwrap();
        assert_eq!(cache.get::<u32>("k").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_wrong_type_is_deserialization_error() {
        let cache = Cache::memory();
        cache.set("user:1", &alice(), &[], None).await.unwrap();

        let result = cache.get::<u64>("user:1").await;
        assert!(matches!(result, Err(CacheError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_get_by_tag_typed() {
        let cache = Cache::memory();
        cache.set("user:1", &alice(), &["users"], None).await.unwrap();
        cache
            .set(
                "user:2",
                &User {
                    name: "Bob".to_string(),
                    active: false,
                },
                &["users"],
                None,
            )
            .await
            .unwrap();
        cache.set("other", &42u8, &["misc"], None).await.unwrap();

        let users: HashMap<String, User> = cache.get_by_tag("users").await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users.get("user:1"), Some(&alice()));
    }

    #[tokio::test]
    async fn test_get_all_typed() {
        let cache = Cache::memory();
        cache.set("a", &1u32, &[], None).await.unwrap();
        cache.set("b", &2u32, &["t"], None).await.unwrap();

        let all: HashMap<String, u32> = cache.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("a"), Some(&1));
    }

    #[tokio::test]
    async fn test_delete_by_tag_through_facade() {
        let cache = Cache::memory();
        cache.set("a", &1u32, &["group"], None).await.unwrap();
        cache.set("b", &2u32, &["group"], None).await.unwrap();
        cache.set("c", &3u32, &["other"], None).await.unwrap();

        assert_eq!(cache.delete_by_tag("group").await.unwrap(), 2);
        assert!(cache.exists("c").await.unwrap());
        assert_eq!(cache.delete_by_tag("group").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_rejects_ttl() {
        let cache = Cache::memory();
        let result = cache
            .set("k", &1u32, &[], Some(Duration::from_secs(5)))
            .await;

        assert!(matches!(result, Err(CacheError::Config(_))));
    }

    #[tokio::test]
    async fn test_facade_implements_store_contract() {
        // Generic code written against the trait accepts the facade itself.
        async fn count_tagged<S: CacheStore>(store: &S, tag: &str) -> usize {
            store.get_by_tag_json(tag).await.unwrap().len()
        }

        let cache = Cache::memory();
        cache.set("a", &1u32, &["t"], None).await.unwrap();
        assert_eq!(count_tagged(&cache, "t").await, 1);
    }
}

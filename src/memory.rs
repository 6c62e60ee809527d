//! Process-local cache store.

use crate::error::{CacheError, CacheResult};
use crate::tags::TagIndex;
use crate::traits::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory cache store.
///
/// Entries and the tag index live behind one read/write lock, so every
/// compound operation sees both in a consistent state. Clones share the same
/// underlying map.
///
/// Entries never expire here. A TTL is refused rather than silently ignored:
/// accepting one would let the same call mean different lifetimes depending
/// on which backend is configured.
#[derive(Clone, Default)]
pub struct MemoryCache {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, String>,
    tags: TagIndex,
}

impl MemoryCache {
    /// Create an empty in-memory cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set_json(
        &self,
        key: &str,
        value: String,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        if ttl.is_some() {
            return Err(CacheError::Config(
                "the memory backend does not support TTLs".to_string(),
            ));
        }

        let mut inner = self.inner.write().await;
        inner.entries.insert(key.to_string(), value);
        inner.tags.assign(key, tags);
        Ok(())
    }

    async fn get_json(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.inner.read().await.entries.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut inner = self.inner.write().await;
        let existed = inner.entries.remove(key).is_some();
        inner.tags.unassign(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.inner.read().await.entries.contains_key(key))
    }

    async fn get_all_json(&self) -> CacheResult<HashMap<String, String>> {
        Ok(self.inner.read().await.entries.clone())
    }

    async fn get_by_tag_json(&self, tag: &str) -> CacheResult<HashMap<String, String>> {
        let inner = self.inner.read().await;
        let mut result = HashMap::new();
        for key in inner.tags.keys_for(tag) {
            if let Some(value) = inner.entries.get(&key) {
                result.insert(key, value.clone());
            }
        }
        Ok(result)
    }

    async fn delete_by_tag(&self, tag: &str) -> CacheResult<usize> {
        let mut inner = self.inner.write().await;
        let mut removed = 0;
        for key in inner.tags.keys_for(tag) {
            if inner.entries.remove(&key).is_some() {
                removed += 1;
            }
            inner.tags.unassign(&key);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();

        cache
            .set_json("key", "value".to_string(), &[], None)
            .await
            .unwrap();
        assert_eq!(cache.get_json("key").await.unwrap(), Some("value".to_string()));
        assert!(cache.exists("key").await.unwrap());

        assert!(cache.delete("key").await.unwrap());
        assert_eq!(cache.get_json("key").await.unwrap(), None);
        assert!(!cache.delete("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_key_is_none_not_error() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get_json("missing").await.unwrap(), None);
        assert!(!cache.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_is_refused() {
        let cache = MemoryCache::new();
        let result = cache
            .set_json("key", "value".to_string(), &[], Some(Duration::from_secs(60)))
            .await;

        assert!(matches!(result, Err(CacheError::Config(_))));
        assert!(!cache.exists("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_by_tag() {
        let cache = MemoryCache::new();
        cache
            .set_json("user:1", "alice".to_string(), &["users", "active"], None)
            .await
            .unwrap();
        cache
            .set_json("user:2", "bob".to_string(), &["users"], None)
            .await
            .unwrap();

        let users = cache.get_by_tag_json("users").await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users.get("user:1"), Some(&"alice".to_string()));

        let active = cache.get_by_tag_json("active").await.unwrap();
        assert_eq!(active.len(), 1);

        assert!(cache.get_by_tag_json("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_tags() {
        let cache = MemoryCache::new();
        cache
            .set_json("key", "v1".to_string(), &["old", "both"], None)
            .await
            .unwrap();
        cache
            .set_json("key", "v2".to_string(), &["both", "new"], None)
            .await
            .unwrap();

        assert!(cache.get_by_tag_json("old").await.unwrap().is_empty());
        assert_eq!(cache.get_by_tag_json("both").await.unwrap().len(), 1);
        assert_eq!(cache.get_by_tag_json("new").await.unwrap().len(), 1);
        assert_eq!(cache.get_json("key").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_delete_by_tag_counts_removals() {
        let cache = MemoryCache::new();
        cache
            .set_json("a", "1".to_string(), &["group"], None)
            .await
            .unwrap();
        cache
            .set_json("b", "2".to_string(), &["group", "keep"], None)
            .await
            .unwrap();
        cache
            .set_json("c", "3".to_string(), &["other"], None)
            .await
            .unwrap();

        assert_eq!(cache.delete_by_tag("group").await.unwrap(), 2);
        assert!(!cache.exists("a").await.unwrap());
        assert!(!cache.exists("b").await.unwrap());
        assert!(cache.exists("c").await.unwrap());

        // The survivors' tags are untouched; the emptied ones are gone.
        assert!(cache.get_by_tag_json("keep").await.unwrap().is_empty());
        assert_eq!(cache.get_by_tag_json("other").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_tag_unknown_tag() {
        let cache = MemoryCache::new();
        assert_eq!(cache.delete_by_tag("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_unlinks_tags() {
        let cache = MemoryCache::new();
        cache
            .set_json("key", "v".to_string(), &["t"], None)
            .await
            .unwrap();

        cache.delete("key").await.unwrap();
        assert!(cache.get_by_tag_json("t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_all() {
        let cache = MemoryCache::new();
        assert!(cache.get_all_json().await.unwrap().is_empty());

        cache.set_json("a", "1".to_string(), &[], None).await.unwrap();
        cache.set_json("b", "2".to_string(), &["t"], None).await.unwrap();

        let all = cache.get_all_json().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("b"), Some(&"2".to_string()));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = MemoryCache::new();
        let other = cache.clone();

        cache.set_json("key", "v".to_string(), &[], None).await.unwrap();
        assert!(other.exists("key").await.unwrap());
        assert_eq!(other.len().await, 1);
    }
}

//! Cache store trait definition.

use crate::error::CacheResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Contract shared by every cache backend.
///
/// Values travel as JSON strings at this level; [`Cache`](crate::cache::Cache)
/// adds the typed layer on top. Every store keeps a bidirectional tag index
/// next to the entries: a key knows its tags and a tag knows its keys, an
/// overwrite replaces the key's tag set rather than extending it, and a tag
/// that loses its last key disappears.
///
/// Backends with native expiry can drop entries without going through this
/// interface. Read operations treat an index reference to a missing entry as
/// stale and prune it before answering, so callers never observe a tag
/// pointing at nothing.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store or overwrite an entry and replace its tag set.
    ///
    /// # Arguments
    ///
    /// * `key` - The cache key
    /// * `value` - The JSON string value
    /// * `tags` - Full tag set for the entry; an empty slice clears all tags
    /// * `ttl` - Optional time-to-live duration
    async fn set_json(
        &self,
        key: &str,
        value: String,
        tags: &[&str],
        ttl: Option<Duration>,
    ) -> CacheResult<()>;

    /// Get a JSON value from the cache.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(value))` if the key exists, `Ok(None)` if not found,
    /// or an error if the operation fails.
    async fn get_json(&self, key: &str) -> CacheResult<Option<String>>;

    /// Delete an entry and unlink it from every tag.
    ///
    /// # Returns
    ///
    /// Returns whether the entry existed before the call.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Check if a key exists in the cache.
    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Get every entry in the cache, keyed by cache key.
    async fn get_all_json(&self) -> CacheResult<HashMap<String, String>>;

    /// Get every entry carrying `tag`, keyed by cache key.
    ///
    /// Unknown tags yield an empty map, not an error.
    async fn get_by_tag_json(&self, tag: &str) -> CacheResult<HashMap<String, String>>;

    /// Delete every entry carrying `tag`.
    ///
    /// Best-effort: each key in the tag's set is attempted even if an earlier
    /// one fails, and the first failure (if any) is returned after the pass.
    ///
    /// # Returns
    ///
    /// Returns the number of entries that existed and were removed.
    async fn delete_by_tag(&self, tag: &str) -> CacheResult<usize>;
}

//! Redis key layout and the tag bookkeeping shared by the networked stores.
//!
//! One prefixed namespace holds three key families:
//!
//! * `{prefix}{key}` - the entry's value (plain string, `SET`/`SETEX`)
//! * `{prefix}tag:{tag}` - set of cache keys carrying the tag
//! * `{prefix}key_tags:{key}` - set of tags carried by the key
//!
//! The forward set's lifetime follows its value: it receives the value's TTL
//! on a timed write and is persisted again on an untimed overwrite. Tag sets
//! carry no TTL and are pruned as reads discover dead references; Redis drops
//! a set the moment `SREM` empties it, so no empty tag sets accumulate.
//!
//! Writes are ordered value-first: an entry's value is stored before its tags
//! are linked, and deleted before they are unlinked. A failure between the
//! two steps therefore strands at worst an index reference to a missing
//! value, which the read paths already treat as stale and prune, never a
//! dangling value reachable by tag.

use crate::error::{CacheError, CacheResult};
use crate::tags::tag_diff;
use futures::future::join_all;
use redis::AsyncCommands;
use redis::aio::ConnectionLike;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const TAG_NS: &str = "tag:";
const KEY_TAGS_NS: &str = "key_tags:";

/// Key layout for one prefixed cache namespace.
#[derive(Debug, Clone)]
pub(crate) struct Keyspace {
    prefix: String,
}

impl Keyspace {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Storage key for an entry's value.
    pub(crate) fn value_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Set of cache keys carrying `tag`.
    pub(crate) fn tag_key(&self, tag: &str) -> String {
        format!("{}{}{}", self.prefix, TAG_NS, tag)
    }

    /// Set of tags carried by `key`.
    pub(crate) fn key_tags_key(&self, key: &str) -> String {
        format!("{}{}{}", self.prefix, KEY_TAGS_NS, key)
    }

    /// Pattern matching every key in this namespace.
    pub(crate) fn pattern(&self) -> String {
        format!("{}*", self.prefix)
    }

    /// Whether a raw storage key belongs to the index rather than to an entry.
    pub(crate) fn is_index_key(&self, raw: &str) -> bool {
        self.strip(raw)
            .is_some_and(|rest| rest.starts_with(TAG_NS) || rest.starts_with(KEY_TAGS_NS))
    }

    /// The cache key behind a raw storage key, if it is in this namespace.
    pub(crate) fn strip<'a>(&self, raw: &'a str) -> Option<&'a str> {
        raw.strip_prefix(&self.prefix)
    }
}

/// Bound an operation future, mapping an elapsed timer to
/// [`CacheError::Timeout`].
pub(crate) async fn timed<T>(
    limit: Duration,
    op: impl Future<Output = CacheResult<T>>,
) -> CacheResult<T> {
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result,
        Err(_) => Err(CacheError::Timeout),
    }
}

/// Truncate a TTL to whole seconds, with a floor of one second;
/// `SETEX`/`EXPIRE` reject zero.
fn ttl_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

pub(crate) async fn ping<C>(conn: &mut C) -> CacheResult<()>
where
    C: ConnectionLike + Send + Sync,
{
    let _: String = redis::cmd("PING")
        .query_async(&mut *conn)
        .await
        .map_err(|e| CacheError::Connection(e.to_string()))?;
    Ok(())
}

/// Store an entry's value, then bring its tag links up to date.
pub(crate) async fn store<C>(
    conn: &mut C,
    ks: &Keyspace,
    key: &str,
    value: String,
    tags: &[&str],
    ttl: Option<Duration>,
) -> CacheResult<()>
where
    C: ConnectionLike + Send + Sync,
{
    let ttl = ttl.filter(|t| !t.is_zero());
    let value_key = ks.value_key(key);

    if let Some(ttl) = ttl {
        let _: () = conn.set_ex(&value_key, value, ttl_seconds(ttl)).await?;
    } else {
        let _: () = conn.set(&value_key, value).await?;
    }

    relink(conn, ks, key, tags, ttl).await
}

/// Replace `key`'s tag links with `tags`, touching only the delta.
async fn relink<C>(
    conn: &mut C,
    ks: &Keyspace,
    key: &str,
    tags: &[&str],
    ttl: Option<Duration>,
) -> CacheResult<()>
where
    C: ConnectionLike + Send + Sync,
{
    let key_tags_key = ks.key_tags_key(key);
    let old: HashSet<String> = conn.smembers(&key_tags_key).await?;
    let new: HashSet<String> = tags.iter().map(|t| t.to_string()).collect();
    let (removed, added) = tag_diff(&old, &new);

    for tag in &removed {
        let _: () = conn.srem(ks.tag_key(tag), key).await?;
    }
    for tag in &added {
        let _: () = conn.sadd(ks.tag_key(tag), key).await?;
    }

    if !removed.is_empty() {
        let _: () = conn.srem(&key_tags_key, &removed).await?;
    }
    if !added.is_empty() {
        let _: () = conn.sadd(&key_tags_key, &added).await?;
    }

    // Align the forward set's lifetime with the value it describes.
    if !new.is_empty() {
        match ttl {
            Some(ttl) => {
                let _: () = conn.expire(&key_tags_key, ttl_seconds(ttl) as i64).await?;
            }
            None => {
                let _: () = conn.persist(&key_tags_key).await?;
            }
        }
    }

    Ok(())
}

/// Fetch an entry's value. A miss prunes whatever the index still says
/// about the key, so expired entries do not linger in their tags.
pub(crate) async fn fetch<C>(conn: &mut C, ks: &Keyspace, key: &str) -> CacheResult<Option<String>>
where
    C: ConnectionLike + Send + Sync,
{
    let value: Option<String> = conn.get(ks.value_key(key)).await?;
    if value.is_none() {
        unlink_stale(conn, ks, key).await?;
    }
    Ok(value)
}

/// Unlink `key` from every tag it carries and drop its forward set.
/// Returns the tags it carried; idempotent for unknown keys.
pub(crate) async fn unlink<C>(
    conn: &mut C,
    ks: &Keyspace,
    key: &str,
) -> CacheResult<HashSet<String>>
where
    C: ConnectionLike + Send + Sync,
{
    let key_tags_key = ks.key_tags_key(key);
    let tags: HashSet<String> = conn.smembers(&key_tags_key).await?;

    for tag in &tags {
        let _: () = conn.srem(ks.tag_key(tag), key).await?;
    }
    if !tags.is_empty() {
        let _: () = conn.del(&key_tags_key).await?;
    }

    Ok(tags)
}

/// [`unlink`] for a key discovered dead during a read, with a trace of what
/// was cleaned up.
async fn unlink_stale<C>(conn: &mut C, ks: &Keyspace, key: &str) -> CacheResult<()>
where
    C: ConnectionLike + Send + Sync,
{
    let tags = unlink(conn, ks, key).await?;
    if !tags.is_empty() {
        debug!(key, tags = tags.len(), "pruned index entries for expired key");
    }
    Ok(())
}

/// Delete an entry's value, then unlink its tags. Returns whether the value
/// existed.
pub(crate) async fn remove<C>(conn: &mut C, ks: &Keyspace, key: &str) -> CacheResult<bool>
where
    C: ConnectionLike + Send + Sync,
{
    let deleted: i64 = conn.del(ks.value_key(key)).await?;
    unlink(conn, ks, key).await?;
    Ok(deleted > 0)
}

pub(crate) async fn contains<C>(conn: &mut C, ks: &Keyspace, key: &str) -> CacheResult<bool>
where
    C: ConnectionLike + Send + Sync,
{
    let exists: bool = conn.exists(ks.value_key(key)).await?;
    Ok(exists)
}

/// Fetch every entry in the namespace, pruning index references to values
/// that expired between enumeration and retrieval.
pub(crate) async fn fetch_all<C>(
    conn: &mut C,
    ks: &Keyspace,
) -> CacheResult<HashMap<String, String>>
where
    C: ConnectionLike + Send + Sync,
{
    let raw_keys: Vec<String> = conn.keys(ks.pattern()).await?;
    let entry_keys: Vec<String> = raw_keys
        .into_iter()
        .filter(|raw| !ks.is_index_key(raw))
        .collect();

    // MGET with no keys is a protocol error.
    if entry_keys.is_empty() {
        return Ok(HashMap::new());
    }

    let values: Vec<Option<String>> = conn.mget(&entry_keys).await?;

    let mut result = HashMap::with_capacity(entry_keys.len());
    for (raw, value) in entry_keys.iter().zip(values) {
        let Some(key) = ks.strip(raw) else { continue };
        match value {
            Some(value) => {
                result.insert(key.to_string(), value);
            }
            None => unlink_stale(conn, ks, key).await?,
        }
    }

    Ok(result)
}

/// Fetch every entry carrying `tag`, pruning members whose value is gone.
pub(crate) async fn fetch_by_tag<C>(
    conn: &mut C,
    ks: &Keyspace,
    tag: &str,
) -> CacheResult<HashMap<String, String>>
where
    C: ConnectionLike + Send + Sync,
{
    let tag_key = ks.tag_key(tag);
    let members: Vec<String> = conn.smembers(&tag_key).await?;
    if members.is_empty() {
        return Ok(HashMap::new());
    }

    let value_keys: Vec<String> = members.iter().map(|k| ks.value_key(k)).collect();
    let values: Vec<Option<String>> = conn.mget(&value_keys).await?;

    let mut result = HashMap::with_capacity(members.len());
    for (key, value) in members.into_iter().zip(values) {
        match value {
            Some(value) => {
                result.insert(key, value);
            }
            None => {
                // The forward set may have expired along with the value, in
                // which case unlink alone cannot find this tag set.
                let _: () = conn.srem(&tag_key, &key).await?;
                unlink_stale(conn, ks, &key).await?;
            }
        }
    }

    Ok(result)
}

/// Delete every entry carrying `tag`, best-effort.
///
/// All members of the tag's snapshot are attempted; the count of confirmed
/// removals is returned when every attempt succeeds, otherwise the first
/// failure is surfaced after the pass and the rest are logged.
pub(crate) async fn remove_by_tag<C>(conn: &mut C, ks: &Keyspace, tag: &str) -> CacheResult<usize>
where
    C: ConnectionLike + Clone + Send + Sync,
{
    let members: Vec<String> = conn.smembers(ks.tag_key(tag)).await?;
    if members.is_empty() {
        return Ok(0);
    }

    let removals = members.iter().map(|key| {
        let mut conn = conn.clone();
        let ks = ks.clone();
        async move { remove(&mut conn, &ks, key).await }
    });
    let outcomes = join_all(removals).await;

    let mut removed = 0;
    let mut first_error = None;
    for (key, outcome) in members.iter().zip(outcomes) {
        match outcome {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(error) => {
                if first_error.is_none() {
                    first_error = Some(error);
                } else {
                    warn!(key = %key, error = %error, "failed to delete tagged key");
                }
            }
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(removed),
    }
}

//! Tag-aware caching with interchangeable backends.
//!
//! One interface over three backends: a process-local map, a single Redis
//! server, and a Redis deployment under Sentinel failover. Every entry can
//! carry a set of tags, and tags are first-class: entries can be fetched or
//! invalidated as a group, a tag always knows exactly the keys that carry
//! it, and overwriting an entry replaces its tag set rather than extending
//! it.
//!
//! When Redis expires an entry on its own, the tag index learns about it
//! lazily: the next read that touches the dead key or one of its tags prunes
//! the stale references before answering. Callers never see a tag pointing
//! at a missing entry.
//!
//! # Features
//!
//! - `redis` - Enable the Redis and Redis Sentinel backends (enabled by
//!   default). Without it the crate compiles with only the in-memory
//!   backend.
//!
//! # Examples
//!
//! ## In-memory
//!
//! ```
//! use tagcache::Cache;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tagcache::CacheError> {
//!     let cache = Cache::memory();
//!
//!     cache.set("user:1", &"Alice", &["users", "active"], None).await?;
//!     cache.set("user:2", &"Bob", &["users"], None).await?;
//!
//!     let users: std::collections::HashMap<String, String> =
//!         cache.get_by_tag("users").await?;
//!     assert_eq!(users.len(), 2);
//!
//!     // Drop everything tagged "users" in one call.
//!     assert_eq!(cache.delete_by_tag("users").await?, 2);
//!     Ok(())
//! }
//! ```
//!
//! ## Redis
//!
//! ```no_run
//! use std::time::Duration;
//! use tagcache::{Cache, RedisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tagcache::CacheError> {
//!     let config = RedisConfig::new()
//!         .with_host("localhost")
//!         .with_key_prefix("app:");
//!     let cache = Cache::connect(config.into()).await?;
//!
//!     cache
//!         .set("session:9", &"token", &["sessions"], Some(Duration::from_secs(3600)))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Sentinel
//!
//! ```no_run
//! use tagcache::{Cache, SentinelConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tagcache::CacheError> {
//!     let config = SentinelConfig::new(
//!         vec!["10.0.0.1:26379".to_string(), "10.0.0.2:26379".to_string()],
//!         "mymaster",
//!     );
//!     let cache = Cache::connect(config.into()).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod tags;
pub mod traits;

#[cfg(feature = "redis")]
mod keyspace;

#[cfg(feature = "redis")]
pub mod redis_cache;

#[cfg(feature = "redis")]
pub mod sentinel;

pub use cache::Cache;
pub use config::{BackendKind, CacheConfig, RedisConfig, SentinelConfig};
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use tags::TagIndex;
pub use traits::CacheStore;

#[cfg(feature = "redis")]
pub use redis_cache::RedisCache;

#[cfg(feature = "redis")]
pub use sentinel::SentinelCache;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::Cache;
    pub use crate::config::{BackendKind, CacheConfig, RedisConfig, SentinelConfig};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::memory::MemoryCache;
    pub use crate::traits::CacheStore;

    #[cfg(feature = "redis")]
    pub use crate::redis_cache::RedisCache;

    #[cfg(feature = "redis")]
    pub use crate::sentinel::SentinelCache;
}

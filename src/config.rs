//! Backend selection and connection configuration.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Cache backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Process-local map
    Memory,
    /// Single Redis server
    Redis,
    /// Redis behind Sentinel failover
    RedisSentinel,
}

impl BackendKind {
    /// Canonical identifier, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Redis => "redis",
            BackendKind::RedisSentinel => "redis-sentinel",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(BackendKind::Memory),
            "redis" => Ok(BackendKind::Redis),
            "redis-sentinel" => Ok(BackendKind::RedisSentinel),
            other => Err(CacheError::Config(format!("unsupported backend: {other}"))),
        }
    }
}

/// Cache configuration: which backend to use and how to reach it.
///
/// # Examples
///
/// ```
/// use tagcache::{CacheConfig, RedisConfig};
///
/// let config: CacheConfig = RedisConfig::new().with_host("cache.internal").into();
/// assert_eq!(config.kind().as_str(), "redis");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum CacheConfig {
    /// Process-local cache, no connection parameters
    Memory,
    /// Single Redis server
    Redis(RedisConfig),
    /// Redis with Sentinel failover
    RedisSentinel(SentinelConfig),
}

impl CacheConfig {
    /// Configuration for the process-local backend.
    pub fn memory() -> Self {
        CacheConfig::Memory
    }

    /// The backend kind this configuration selects.
    pub fn kind(&self) -> BackendKind {
        match self {
            CacheConfig::Memory => BackendKind::Memory,
            CacheConfig::Redis(_) => BackendKind::Redis,
            CacheConfig::RedisSentinel(_) => BackendKind::RedisSentinel,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `CACHE_BACKEND` selects the backend (`memory` when unset; anything
    /// outside the known set is a configuration error). The remaining
    /// variables override per-backend defaults:
    ///
    /// * `CACHE_KEY_PREFIX`
    /// * `CACHE_REDIS_HOST`, `CACHE_REDIS_PORT`, `CACHE_REDIS_DATABASE`,
    ///   `CACHE_REDIS_PASSWORD`
    /// * `CACHE_SENTINEL_NODES` (comma-separated `host:port` list),
    ///   `CACHE_SENTINEL_SERVICE`, `CACHE_SENTINEL_PASSWORD`
    pub fn from_env() -> CacheResult<Self> {
        let kind = match std::env::var("CACHE_BACKEND") {
            Ok(name) => name.parse::<BackendKind>()?,
            Err(_) => BackendKind::Memory,
        };

        match kind {
            BackendKind::Memory => Ok(CacheConfig::Memory),
            BackendKind::Redis => {
                let mut config = RedisConfig::new();

                if let Ok(host) = std::env::var("CACHE_REDIS_HOST") {
                    config.host = host;
                }
                if let Ok(port) = std::env::var("CACHE_REDIS_PORT")
                    && let Ok(port) = port.parse()
                {
                    config.port = port;
                }
                if let Ok(db) = std::env::var("CACHE_REDIS_DATABASE")
                    && let Ok(db) = db.parse()
                {
                    config.database = db;
                }
                if let Ok(password) = std::env::var("CACHE_REDIS_PASSWORD") {
                    config.password = Some(password);
                }
                if let Ok(prefix) = std::env::var("CACHE_KEY_PREFIX") {
                    config.key_prefix = prefix;
                }

                Ok(CacheConfig::Redis(config))
            }
            BackendKind::RedisSentinel => {
                let sentinels: Vec<String> = match std::env::var("CACHE_SENTINEL_NODES") {
                    Ok(nodes) => nodes.split(',').map(|s| s.trim().to_string()).collect(),
                    Err(_) => Vec::new(),
                };
                let service_name = std::env::var("CACHE_SENTINEL_SERVICE").unwrap_or_default();

                let mut config = SentinelConfig::new(sentinels, service_name);

                if let Ok(db) = std::env::var("CACHE_REDIS_DATABASE")
                    && let Ok(db) = db.parse()
                {
                    config.database = db;
                }
                if let Ok(password) = std::env::var("CACHE_REDIS_PASSWORD") {
                    config.password = Some(password);
                }
                if let Ok(password) = std::env::var("CACHE_SENTINEL_PASSWORD") {
                    config.sentinel_password = Some(password);
                }
                if let Ok(prefix) = std::env::var("CACHE_KEY_PREFIX") {
                    config.key_prefix = prefix;
                }

                Ok(CacheConfig::RedisSentinel(config))
            }
        }
    }
}

impl From<RedisConfig> for CacheConfig {
    fn from(config: RedisConfig) -> Self {
        CacheConfig::Redis(config)
    }
}

impl From<SentinelConfig> for CacheConfig {
    fn from(config: SentinelConfig) -> Self {
        CacheConfig::RedisSentinel(config)
    }
}

/// Prefix used when none is configured.
const DEFAULT_KEY_PREFIX: &str = "cache:";

/// Configuration for a single Redis server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Database number (0-15).
    pub database: u8,

    /// Password, if the server requires AUTH.
    pub password: Option<String>,

    /// Prefix applied to every key this cache touches.
    pub key_prefix: String,

    /// Connection establishment timeout.
    #[serde(with = "duration_ms")]
    pub connection_timeout: Duration,

    /// Per-operation timeout.
    #[serde(with = "duration_ms")]
    pub operation_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
            password: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            connection_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(3),
        }
    }
}

impl RedisConfig {
    /// Create a configuration with default values (`localhost:6379`, db 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database number.
    pub fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the operation timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> CacheResult<()> {
        if self.host.is_empty() {
            return Err(CacheError::Config("redis host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(CacheError::Config("redis port must not be 0".to_string()));
        }
        Ok(())
    }

    /// The full connection URL with auth and database.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => {
                format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.database)
            }
            None => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Configuration for a Redis deployment managed by Sentinel.
///
/// Timeouts default to 100ms: sentinel setups exist for fast failover, and a
/// sluggish node should be abandoned quickly rather than waited on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Sentinel addresses as `host:port` pairs.
    pub sentinels: Vec<String>,

    /// Master name registered with the sentinels.
    pub service_name: String,

    /// Database number on the master (0-15).
    pub database: u8,

    /// Password for the master, if it requires AUTH.
    pub password: Option<String>,

    /// Password for the sentinel nodes themselves, if they require AUTH.
    pub sentinel_password: Option<String>,

    /// Prefix applied to every key this cache touches.
    pub key_prefix: String,

    /// Connection establishment timeout.
    #[serde(with = "duration_ms")]
    pub connection_timeout: Duration,

    /// Per-operation timeout.
    #[serde(with = "duration_ms")]
    pub operation_timeout: Duration,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            sentinels: Vec::new(),
            service_name: String::new(),
            database: 0,
            password: None,
            sentinel_password: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            connection_timeout: Duration::from_millis(100),
            operation_timeout: Duration::from_millis(100),
        }
    }
}

impl SentinelConfig {
    /// Create a configuration for the given sentinel nodes and master name.
    ///
    /// # Arguments
    ///
    /// * `sentinels` - Sentinel addresses as `host:port` pairs
    /// * `service_name` - Master name registered with the sentinels
    pub fn new(sentinels: Vec<String>, service_name: impl Into<String>) -> Self {
        Self {
            sentinels,
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the database number.
    pub fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    /// Set the master password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the password for the sentinel nodes.
    pub fn with_sentinel_password(mut self, password: impl Into<String>) -> Self {
        self.sentinel_password = Some(password.into());
        self
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the operation timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> CacheResult<()> {
        if self.sentinels.is_empty() {
            return Err(CacheError::Config(
                "at least one sentinel address is required".to_string(),
            ));
        }
        for addr in &self.sentinels {
            let valid = addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                return Err(CacheError::Config(format!(
                    "invalid sentinel address '{addr}': expected host:port"
                )));
            }
        }
        if self.service_name.is_empty() {
            return Err(CacheError::Config(
                "sentinel service name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection URLs for the sentinel nodes, with auth if configured.
    pub fn sentinel_urls(&self) -> Vec<String> {
        self.sentinels
            .iter()
            .map(|addr| match &self.sentinel_password {
                Some(password) => format!("redis://:{}@{}", password, addr),
                None => format!("redis://{}", addr),
            })
            .collect()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

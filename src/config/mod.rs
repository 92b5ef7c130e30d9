//! # Engine Configuration
//!
//! Every tunable of the engine lives in one [`DedupConfig`] tree. Values come
//! from, in increasing precedence:
//!
//! 1. the `Default` impls below,
//! 2. an optional TOML file (`config/dedup.toml`, or an explicit path),
//! 3. environment variables prefixed `DEDUP` with `__` as the nesting
//!    separator, e.g. `DEDUP__STORE__BACKEND=memory`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dedup_core::config::DedupConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DedupConfig::load()?;
//! let lease = config.lock.lease();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Deployment environment (development, test, production)
    pub environment: String,

    /// Default tracing filter when `RUST_LOG` is not set
    pub log_level: String,

    /// Shared key-value store
    pub store: StoreConfig,

    /// Distributed lock settings
    pub lock: LockConfig,

    /// Cache facade settings
    pub cache: CacheConfig,

    /// Penetration bloom filter
    pub bloom_filter: BloomFilterConfig,

    /// Idempotency strategy settings
    pub idempotent: IdempotentConfig,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            store: StoreConfig::default(),
            lock: LockConfig::default(),
            cache: CacheConfig::default(),
            bloom_filter: BloomFilterConfig::default(),
            idempotent: IdempotentConfig::default(),
        }
    }
}

/// Shared store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `redis`, `dragonfly` or `memory`
    pub backend: String,

    /// Prepended to every key the Redis store touches
    pub key_prefix: String,

    /// Connection settings, required for Redis-protocol backends
    pub redis: Option<RedisConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            key_prefix: String::new(),
            redis: None,
        }
    }
}

impl StoreConfig {
    pub fn uses_redis_protocol(&self) -> bool {
        matches!(self.backend.as_str(), "redis" | "dragonfly")
    }
}

/// Redis connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub connection_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout_seconds: 5,
        }
    }
}

/// Distributed lock configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LockConfig {
    /// Lease for blocking locks taken by the cache facade
    pub lease_seconds: u64,

    /// Poll interval while waiting on a contended Redis lock
    pub retry_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_seconds: 30,
            retry_interval_ms: 50,
        }
    }
}

impl LockConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_seconds)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(1))
    }
}

/// Cache facade configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL applied by facade writes that do not name one
    pub default_timeout_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_timeout_seconds: 30,
        }
    }
}

impl CacheConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }
}

/// Penetration bloom filter configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BloomFilterConfig {
    pub enabled: bool,
    pub name: String,
    pub expected_insertions: u64,
    pub false_probability: f64,
}

impl Default for BloomFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "cache_penetration_bloom_filter".to_string(),
            expected_insertions: 64,
            false_probability: 0.03,
        }
    }
}

/// Idempotency strategy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdempotentConfig {
    /// TTL of issued tokens, in milliseconds
    pub token_ttl_ms: u64,

    /// Request header carrying the token (matched case-insensitively)
    pub token_header: String,

    /// Query parameter carrying the token
    pub token_param: String,

    /// TTL of the `consuming` marker for message consumption
    pub mq_consuming_timeout_seconds: u64,

    /// Descriptor timeout when a protected call does not set one
    pub default_timeout_seconds: u64,

    /// Descriptor message when a protected call does not set one
    pub default_message: String,
}

impl Default for IdempotentConfig {
    fn default() -> Self {
        Self {
            token_ttl_ms: 60_000,
            token_header: "Idempotent-Token".to_string(),
            token_param: "idempotentToken".to_string(),
            mq_consuming_timeout_seconds: 600,
            default_timeout_seconds: 60,
            default_message: "Please do not repeat the operation".to_string(),
        }
    }
}

impl IdempotentConfig {
    pub fn mq_consuming_timeout(&self) -> Duration {
        Duration::from_secs(self.mq_consuming_timeout_seconds)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }
}

impl DedupConfig {
    /// Defaults suitable for tests: in-memory store, debug logging
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        match self.store.backend.as_str() {
            "redis" | "dragonfly" | "memory" | "in-memory" => {}
            other => {
                return Err(ConfigurationError::invalid_value(
                    "store.backend",
                    other,
                    "expected one of redis, dragonfly, memory",
                ))
            }
        }

        if self.store.uses_redis_protocol() {
            match &self.store.redis {
                None => {
                    return Err(ConfigurationError::missing_required_field(
                        "store.redis",
                        "store configuration",
                    ))
                }
                Some(redis) if redis.url.trim().is_empty() => {
                    return Err(ConfigurationError::missing_required_field(
                        "store.redis.url",
                        "store configuration",
                    ))
                }
                Some(_) => {}
            }
        }

        if self.lock.lease_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "lock.lease_seconds",
                "0",
                "lease must be greater than 0",
            ));
        }

        if self.idempotent.default_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "idempotent.default_timeout_seconds",
                "0",
                "protection timeout must be greater than 0",
            ));
        }

        if self.idempotent.token_ttl_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "idempotent.token_ttl_ms",
                "0",
                "token lifetime must be greater than 0",
            ));
        }

        if self.cache.default_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "cache.default_timeout_seconds",
                "0",
                "cache TTL must be greater than 0",
            ));
        }

        if self.idempotent.mq_consuming_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "idempotent.mq_consuming_timeout_seconds",
                "0",
                "consuming marker timeout must be greater than 0",
            ));
        }

        let fpp = self.bloom_filter.false_probability;
        if !(fpp > 0.0 && fpp < 1.0) {
            return Err(ConfigurationError::invalid_value(
                "bloom_filter.false_probability",
                fpp.to_string(),
                "must be strictly between 0 and 1",
            ));
        }

        if self.bloom_filter.enabled && self.bloom_filter.expected_insertions == 0 {
            return Err(ConfigurationError::invalid_value(
                "bloom_filter.expected_insertions",
                "0",
                "expected insertions must be greater than 0",
            ));
        }

        Ok(())
    }
}

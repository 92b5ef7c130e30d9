//! Store provider
//!
//! Uses enum dispatch for a zero-cost abstraction over the concrete
//! backends. Unlike a best-effort cache, the store never degrades to a
//! no-op: a backend that cannot be reached is reported as an error, since
//! dedup decisions made without it would be meaningless.

use super::errors::{StoreError, StoreResult};
use super::providers::MemoryStore;
use super::scripts::{AtomicScript, ScriptReply};
use super::traits::KeyValueStore;
use crate::config::StoreConfig;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "store-redis")]
use super::providers::RedisStore;

/// Internal backend enum for zero-cost dispatch
#[derive(Debug, Clone)]
enum StoreBackend {
    /// Redis store provider (boxed to reduce enum size)
    #[cfg(feature = "store-redis")]
    Redis(Box<RedisStore>),

    /// In-memory store provider
    Memory(MemoryStore),
}

impl StoreBackend {
    fn provider_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.provider_name(),
            Self::Memory(s) => s.provider_name(),
        }
    }

    fn is_distributed(&self) -> bool {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.is_distributed(),
            Self::Memory(s) => s.is_distributed(),
        }
    }
}

/// Shared key-value store used by the cache facade and the idempotency handlers
#[derive(Debug, Clone)]
pub struct StoreProvider {
    backend: StoreBackend,
}

impl StoreProvider {
    /// Create a store provider from configuration
    ///
    /// Fails when the configured backend cannot be reached.
    pub async fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        match config.backend.as_str() {
            // "dragonfly" speaks the Redis protocol
            "redis" | "dragonfly" => Self::create_redis_backend(config).await,
            "memory" | "in-memory" => {
                info!(backend = "memory", "Store provider initialized (single process only)");
                Ok(Self::memory())
            }
            other => Err(StoreError::Unavailable(format!(
                "unknown store backend '{other}'"
            ))),
        }
    }

    #[cfg(feature = "store-redis")]
    async fn create_redis_backend(config: &StoreConfig) -> StoreResult<Self> {
        let redis_config = config.redis.as_ref().ok_or_else(|| {
            StoreError::Unavailable("redis store selected but no [store.redis] section".into())
        })?;

        let store = RedisStore::from_config(redis_config, &config.key_prefix)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to connect Redis store"))?;
        info!(backend = "redis", "Store provider initialized successfully");
        Ok(Self {
            backend: StoreBackend::Redis(Box::new(store)),
        })
    }

    #[cfg(not(feature = "store-redis"))]
    async fn create_redis_backend(_config: &StoreConfig) -> StoreResult<Self> {
        Err(StoreError::Unavailable(
            "redis store requested but the 'store-redis' feature is not enabled".into(),
        ))
    }

    /// Create an in-memory provider
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory(MemoryStore::new()),
        }
    }

    /// Wrap an existing Redis store
    #[cfg(feature = "store-redis")]
    pub fn redis(store: RedisStore) -> Self {
        Self {
            backend: StoreBackend::Redis(Box::new(store)),
        }
    }

    /// The Redis store behind this provider, if any
    #[cfg(feature = "store-redis")]
    pub fn as_redis(&self) -> Option<&RedisStore> {
        match &self.backend {
            StoreBackend::Redis(s) => Some(s.as_ref()),
            StoreBackend::Memory(_) => None,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// Whether the store is shared across processes (safe for multi-instance use)
    pub fn is_distributed(&self) -> bool {
        self.backend.is_distributed()
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.get(key).await,
            StoreBackend::Memory(s) => s.get(key).await,
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.set(key, value, ttl).await,
            StoreBackend::Memory(s) => s.set(key, value, ttl).await,
        }
    }

    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.delete(key).await,
            StoreBackend::Memory(s) => s.delete(key).await,
        }
    }

    pub async fn delete_many(&self, keys: &[String]) -> StoreResult<u64> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.delete_many(keys).await,
            StoreBackend::Memory(s) => s.delete_many(keys).await,
        }
    }

    pub async fn count_existing(&self, keys: &[String]) -> StoreResult<u64> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.count_existing(keys).await,
            StoreBackend::Memory(s) => s.count_existing(keys).await,
        }
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.expire(key, ttl).await,
            StoreBackend::Memory(s) => s.expire(key, ttl).await,
        }
    }

    pub async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.ttl(key).await,
            StoreBackend::Memory(s) => s.ttl(key).await,
        }
    }

    pub async fn eval(
        &self,
        script: AtomicScript,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<ScriptReply> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.eval(script, keys, args).await,
            StoreBackend::Memory(s) => s.eval(script, keys, args).await,
        }
    }

    pub async fn health_check(&self) -> StoreResult<bool> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            StoreBackend::Redis(s) => s.health_check().await,
            StoreBackend::Memory(s) => s.health_check().await,
        }
    }
}

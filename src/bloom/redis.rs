//! RedisBloom-backed filter (`BF.*` commands)
//!
//! Requires the RedisBloom module (bundled with Redis Stack and Dragonfly).

use super::BloomFilter;
use crate::store::errors::{StoreError, StoreResult};
use crate::store::providers::redis::prefixed_key;
use crate::store::RedisStore;
use async_trait::async_trait;
use tracing::{debug, info};

#[derive(Clone)]
pub struct RedisBloomFilter {
    connection_manager: redis::aio::ConnectionManager,
    name: String,
    key: String,
}

impl std::fmt::Debug for RedisBloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBloomFilter")
            .field("name", &self.name)
            .field("key", &self.key)
            .finish()
    }
}

impl RedisBloomFilter {
    /// Open the filter, reserving it when it does not exist yet
    pub async fn try_init(
        store: &RedisStore,
        name: &str,
        expected_insertions: u64,
        false_probability: f64,
    ) -> StoreResult<Self> {
        let filter = Self {
            connection_manager: store.connection(),
            name: name.to_string(),
            key: prefixed_key(store.key_prefix(), name),
        };

        let mut conn = filter.connection_manager.clone();
        let reserved: Result<(), redis::RedisError> = redis::cmd("BF.RESERVE")
            .arg(&filter.key)
            .arg(false_probability)
            .arg(expected_insertions.max(1))
            .query_async(&mut conn)
            .await;

        match reserved {
            Ok(()) => info!(name = name, "Bloom filter reserved"),
            // An existing filter keeps its original sizing
            Err(e) if e.to_string().contains("item exists") => {
                debug!(name = name, "Bloom filter already exists")
            }
            Err(e) => {
                return Err(StoreError::BackendError(format!(
                    "Redis BF.RESERVE failed: {}",
                    e
                )))
            }
        }

        Ok(filter)
    }
}

#[async_trait]
impl BloomFilter for RedisBloomFilter {
    async fn contains(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();
        let found: i64 = redis::cmd("BF.EXISTS")
            .arg(&self.key)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::BackendError(format!("Redis BF.EXISTS failed: {}", e)))?;
        Ok(found == 1)
    }

    async fn add(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();
        let added: i64 = redis::cmd("BF.ADD")
            .arg(&self.key)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::BackendError(format!("Redis BF.ADD failed: {}", e)))?;
        Ok(added == 1)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

//! # Bloom Filters
//!
//! Probabilistic membership used by the cache facade to short-circuit
//! lookups for keys that were never written (cache penetration). Filters
//! never report false negatives, may report false positives, and never
//! remove entries.

pub mod simple;

#[cfg(feature = "store-redis")]
pub mod redis;

pub use simple::SimpleBloomFilter;

#[cfg(feature = "store-redis")]
pub use self::redis::RedisBloomFilter;

use crate::config::BloomFilterConfig;
use crate::store::{StoreProvider, StoreResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Membership filter over cache keys
#[async_trait]
pub trait BloomFilter: Send + Sync + std::fmt::Debug {
    /// `false` means the key was definitely never added
    async fn contains(&self, key: &str) -> StoreResult<bool>;

    /// Add a key; returns whether the filter changed
    async fn add(&self, key: &str) -> StoreResult<bool>;

    fn name(&self) -> &str;
}

/// Create the configured penetration filter, if enabled
///
/// Redis-backed stores get a `BF.*` filter shared by every process;
/// in-memory stores get a [`SimpleBloomFilter`].
pub async fn create_bloom_filter(
    config: &BloomFilterConfig,
    store: &StoreProvider,
) -> StoreResult<Option<Arc<dyn BloomFilter>>> {
    if !config.enabled {
        return Ok(None);
    }

    #[cfg(feature = "store-redis")]
    if let Some(redis) = store.as_redis() {
        let filter = RedisBloomFilter::try_init(
            redis,
            &config.name,
            config.expected_insertions,
            config.false_probability,
        )
        .await?;
        return Ok(Some(Arc::new(filter)));
    }

    tracing::debug!(
        store = store.provider_name(),
        name = %config.name,
        "Using in-process bloom filter"
    );
    Ok(Some(Arc::new(SimpleBloomFilter::new(
        config.name.clone(),
        config.expected_insertions,
        config.false_probability,
    ))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_filter_is_none() {
        let filter = create_bloom_filter(&BloomFilterConfig::default(), &StoreProvider::memory())
            .await
            .unwrap();
        assert!(filter.is_none());
    }

    #[tokio::test]
    async fn test_enabled_filter_on_memory_store() {
        let config = BloomFilterConfig {
            enabled: true,
            ..BloomFilterConfig::default()
        };
        let filter = create_bloom_filter(&config, &StoreProvider::memory())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(filter.name(), "cache_penetration_bloom_filter");
        filter.add("k").await.unwrap();
        assert!(filter.contains("k").await.unwrap());
    }
}

//! Cache facade
//!
//! Typed get/put over the shared store plus the guarded load path:
//!
//! ```text
//! safe_get(key)
//!   get(key) hit ────────────────────────────────> value
//!   filter says "never written" ─────────────────> absent
//!   lock safe_get_distributed_lock_get:<key>
//!     get(key) hit ──────────────────────────────> value
//!     loader() none ──> on_still_absent(key) ────> absent
//!     loader() some ──> safe_put ────────────────> value
//!   unlock (every path)
//! ```

use super::errors::{CacheError, CacheResult};
use super::keys::{decode_value, encode_value, is_null_or_blank};
use super::options::SafeGetOptions;
use crate::bloom::BloomFilter;
use crate::config::{CacheConfig, LockConfig};
use crate::lock::LockProvider;
use crate::store::{AtomicScriptLibrary, StoreProvider};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Prefix of the per-key lock taken by `safe_get`
pub const SAFE_GET_LOCK_PREFIX: &str = "safe_get_distributed_lock_get:";

/// Cache operations over the shared store
#[derive(Debug, Clone)]
pub struct CacheFacade {
    store: StoreProvider,
    locks: LockProvider,
    scripts: AtomicScriptLibrary,
    bloom_filter: Option<Arc<dyn BloomFilter>>,
    default_timeout: Duration,
    lock_lease: Duration,
}

impl CacheFacade {
    pub fn new(
        store: StoreProvider,
        locks: LockProvider,
        cache_config: &CacheConfig,
        lock_config: &LockConfig,
    ) -> Self {
        Self {
            scripts: AtomicScriptLibrary::new(store.clone()),
            store,
            locks,
            bloom_filter: None,
            default_timeout: cache_config.default_timeout(),
            lock_lease: lock_config.lease(),
        }
    }

    /// Attach the configured penetration filter
    pub fn with_bloom_filter(mut self, filter: Option<Arc<dyn BloomFilter>>) -> Self {
        self.bloom_filter = filter;
        self
    }

    /// The configured penetration filter, if any
    pub fn bloom_filter(&self) -> Option<&dyn BloomFilter> {
        self.bloom_filter.as_deref()
    }

    /// Options pre-filled with the configured filter
    pub fn penetration_options(&self) -> SafeGetOptions<'_> {
        SafeGetOptions::new().maybe_bloom_filter(self.bloom_filter())
    }

    pub fn scripts(&self) -> &AtomicScriptLibrary {
        &self.scripts
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn ttl_or_default(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or(self.default_timeout)
    }

    /// Raw stored text; blank values count as absent
    pub async fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let raw = self.store.get(key).await?;
        if is_null_or_blank(raw.as_deref()) {
            return Ok(None);
        }
        Ok(raw)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(raw) => decode_value(raw).map(Some),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let raw = encode_value(value)?;
        self.store.set(key, &raw, self.ttl_or_default(ttl)).await?;
        Ok(())
    }

    pub async fn put_if_absent<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let raw = encode_value(value)?;
        Ok(self
            .scripts
            .put_if_absent(key, &raw, self.ttl_or_default(ttl))
            .await?)
    }

    pub async fn put_if_exists<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        let raw = encode_value(value)?;
        Ok(self
            .scripts
            .put_if_exists(key, &raw, self.ttl_or_default(ttl))
            .await?)
    }

    pub async fn put_if_all_absent(
        &self,
        keys: &[String],
        ttl: Option<Duration>,
    ) -> CacheResult<bool> {
        Ok(self
            .scripts
            .put_if_all_absent(keys, self.ttl_or_default(ttl))
            .await?)
    }

    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.store.delete(key).await?)
    }

    pub async fn delete_many(&self, keys: &[String]) -> CacheResult<u64> {
        Ok(self.store.delete_many(keys).await?)
    }

    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get_raw(key).await?.is_some())
    }

    pub async fn count_existing_keys(&self, keys: &[String]) -> CacheResult<u64> {
        Ok(self.store.count_existing(keys).await?)
    }

    pub async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        Ok(self.store.expire(key, ttl).await?)
    }

    pub async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        Ok(self.store.ttl(key).await?)
    }

    /// Read-through without mutual exclusion
    ///
    /// Concurrent misses each run the loader; use [`CacheFacade::safe_get`]
    /// for hot keys.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
        ttl: Option<Duration>,
    ) -> CacheResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
    {
        if let Some(hit) = self.get::<T>(key).await? {
            return Ok(Some(hit));
        }

        let Some(loaded) = loader().await.map_err(CacheError::Loader)? else {
            return Ok(None);
        };
        let raw = encode_value(&loaded)?;
        if is_null_or_blank(Some(&raw)) {
            return Ok(None);
        }
        self.store.set(key, &raw, self.ttl_or_default(ttl)).await?;
        Ok(Some(loaded))
    }

    /// Guarded load: one loader call per key across the cluster, with
    /// optional bloom-filter short-circuit for never-written keys
    pub async fn safe_get<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
        ttl: Duration,
        options: SafeGetOptions<'_>,
    ) -> CacheResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
    {
        if let Some(hit) = self.get::<T>(key).await? {
            debug!(key = key, "Cache HIT");
            return Ok(Some(hit));
        }

        if !options.bypasses_filter(key) {
            if let Some(filter) = options.bloom_filter {
                if !filter.contains(key).await? {
                    debug!(
                        key = key,
                        filter = filter.name(),
                        "Cache MISS short-circuited by bloom filter"
                    );
                    return Ok(None);
                }
            }
        }

        let lock_key = format!("{SAFE_GET_LOCK_PREFIX}{key}");
        let handle = self.locks.lock(&lock_key, self.lock_lease).await?;

        let result = self.load_under_lock(key, loader, ttl, &options).await;

        if let Err(e) = handle.release().await {
            warn!(key = key, error = %e, "Failed to release safe_get lock");
        }
        result
    }

    async fn load_under_lock<T, F, Fut>(
        &self,
        key: &str,
        loader: F,
        ttl: Duration,
        options: &SafeGetOptions<'_>,
    ) -> CacheResult<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Option<T>>> + Send,
    {
        if let Some(hit) = self.get::<T>(key).await? {
            debug!(key = key, "Cache HIT after lock");
            return Ok(Some(hit));
        }

        let loaded = loader().await.map_err(CacheError::Loader)?;
        let encoded = match &loaded {
            Some(value) => Some(encode_value(value)?),
            None => None,
        };

        match (loaded, encoded) {
            (Some(value), Some(raw)) if !is_null_or_blank(Some(&raw)) => {
                self.write_through(key, &raw, ttl, options.bloom_filter)
                    .await?;
                debug!(key = key, "Cache LOADED");
                Ok(Some(value))
            }
            _ => {
                debug!(key = key, "Loader found nothing");
                if let Some(callback) = options.on_still_absent {
                    callback(key);
                }
                Ok(None)
            }
        }
    }

    /// Write a value and register its key with the filter
    pub async fn safe_put<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        bloom_filter: Option<&dyn BloomFilter>,
    ) -> CacheResult<()> {
        let raw = encode_value(value)?;
        self.write_through(key, &raw, ttl, bloom_filter).await
    }

    async fn write_through(
        &self,
        key: &str,
        raw: &str,
        ttl: Duration,
        bloom_filter: Option<&dyn BloomFilter>,
    ) -> CacheResult<()> {
        self.store.set(key, raw, ttl).await?;
        if let Some(filter) = bloom_filter {
            filter.add(key).await?;
        }
        Ok(())
    }
}

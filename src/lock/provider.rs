//! Lock provider
//!
//! Enum dispatch over the concrete lock services, plus the owner-token
//! bookkeeping that turns a raw acquire into a [`LockHandle`].

use super::handle::LockHandle;
use super::providers::MemoryLockService;
use super::traits::{DistributedLock, ReleaseOutcome};
use crate::config::LockConfig;
use crate::store::{StoreProvider, StoreResult};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[cfg(feature = "store-redis")]
use super::providers::RedisLockService;

#[derive(Debug, Clone)]
enum LockBackend {
    #[cfg(feature = "store-redis")]
    Redis(Box<RedisLockService>),
    Memory(MemoryLockService),
}

/// Distributed lock provider
#[derive(Debug, Clone)]
pub struct LockProvider {
    backend: LockBackend,
}

impl LockProvider {
    /// Build a lock provider on the same backend as the store
    pub fn for_store(store: &StoreProvider, config: &LockConfig) -> Self {
        #[cfg(feature = "store-redis")]
        if let Some(redis) = store.as_redis() {
            info!(backend = "redis", "Lock provider initialized");
            return Self {
                backend: LockBackend::Redis(Box::new(RedisLockService::from_store(
                    redis,
                    config.retry_interval(),
                ))),
            };
        }

        info!(
            backend = "memory",
            store = store.provider_name(),
            "Lock provider initialized (single process only)"
        );
        Self::memory(config.retry_interval())
    }

    pub fn memory(retry_interval: Duration) -> Self {
        Self {
            backend: LockBackend::Memory(MemoryLockService::new(retry_interval)),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            LockBackend::Redis(l) => l.provider_name(),
            LockBackend::Memory(l) => l.provider_name(),
        }
    }

    /// Wait for the lock under a fresh owner token
    pub async fn lock(&self, key: &str, lease: Duration) -> StoreResult<LockHandle> {
        let owner = Uuid::new_v4().to_string();
        self.acquire(key, &owner, lease).await?;
        Ok(LockHandle::new(key, owner, self.clone()))
    }

    /// Take the lock without waiting; `None` when another owner holds it
    pub async fn try_lock(&self, key: &str, lease: Duration) -> StoreResult<Option<LockHandle>> {
        let owner = Uuid::new_v4().to_string();
        if self.try_acquire(key, &owner, lease).await? {
            Ok(Some(LockHandle::new(key, owner, self.clone())))
        } else {
            Ok(None)
        }
    }

    /// Re-enter a lock already held by `handle`'s owner
    pub async fn reenter(&self, handle: &LockHandle, lease: Duration) -> StoreResult<LockHandle> {
        self.acquire(handle.key(), handle.owner(), lease).await?;
        Ok(LockHandle::new(
            handle.key(),
            handle.owner().to_string(),
            self.clone(),
        ))
    }
}

impl DistributedLock for LockProvider {
    async fn try_acquire(&self, key: &str, owner: &str, lease: Duration) -> StoreResult<bool> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            LockBackend::Redis(l) => l.try_acquire(key, owner, lease).await,
            LockBackend::Memory(l) => l.try_acquire(key, owner, lease).await,
        }
    }

    async fn acquire(&self, key: &str, owner: &str, lease: Duration) -> StoreResult<()> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            LockBackend::Redis(l) => l.acquire(key, owner, lease).await,
            LockBackend::Memory(l) => l.acquire(key, owner, lease).await,
        }
    }

    async fn release(&self, key: &str, owner: &str) -> StoreResult<ReleaseOutcome> {
        match &self.backend {
            #[cfg(feature = "store-redis")]
            LockBackend::Redis(l) => l.release(key, owner).await,
            LockBackend::Memory(l) => l.release(key, owner).await,
        }
    }

    fn provider_name(&self) -> &'static str {
        LockProvider::provider_name(self)
    }
}

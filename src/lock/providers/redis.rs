//! Redis lock provider
//!
//! Each lock is a hash of `owner -> hold count` with a millisecond lease.
//! Acquire and release are Lua scripts, so a hold is never observed half
//! written. Waiting acquirers poll at the configured retry interval.
//! Requires the `store-redis` feature flag.

use crate::lock::traits::{DistributedLock, ReleaseOutcome};
use crate::store::errors::{StoreError, StoreResult};
use crate::store::providers::redis::prefixed_key;
use crate::store::scripts::ttl_millis;
use crate::store::RedisStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ACQUIRE_SCRIPT: &str = include_str!("../lua/acquire.lua");
const RELEASE_SCRIPT: &str = include_str!("../lua/release.lua");

/// Reentrant lock service on a shared Redis connection
#[derive(Clone)]
pub struct RedisLockService {
    connection_manager: redis::aio::ConnectionManager,
    key_prefix: String,
    retry_interval: Duration,
    acquire: Arc<redis::Script>,
    release: Arc<redis::Script>,
}

impl std::fmt::Debug for RedisLockService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLockService")
            .field("connection_manager", &"ConnectionManager")
            .field("key_prefix", &self.key_prefix)
            .field("retry_interval", &self.retry_interval)
            .finish()
    }
}

impl RedisLockService {
    /// Share the connection and key prefix of an existing store
    pub fn from_store(store: &RedisStore, retry_interval: Duration) -> Self {
        Self {
            connection_manager: store.connection(),
            key_prefix: store.key_prefix().to_string(),
            retry_interval,
            acquire: Arc::new(redis::Script::new(ACQUIRE_SCRIPT)),
            release: Arc::new(redis::Script::new(RELEASE_SCRIPT)),
        }
    }
}

impl DistributedLock for RedisLockService {
    async fn try_acquire(&self, key: &str, owner: &str, lease: Duration) -> StoreResult<bool> {
        let mut conn = self.connection_manager.clone();
        let acquired: i64 = self
            .acquire
            .key(prefixed_key(&self.key_prefix, key))
            .arg(owner)
            .arg(ttl_millis(lease))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::ScriptError {
                script: "lock_acquire",
                reason: e.to_string(),
            })?;

        debug!(key = key, owner = owner, acquired = acquired == 1, "Redis lock TRY");
        Ok(acquired == 1)
    }

    async fn acquire(&self, key: &str, owner: &str, lease: Duration) -> StoreResult<()> {
        loop {
            if self.try_acquire(key, owner, lease).await? {
                return Ok(());
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    async fn release(&self, key: &str, owner: &str) -> StoreResult<ReleaseOutcome> {
        let mut conn = self.connection_manager.clone();
        let reply: i64 = self
            .release
            .key(prefixed_key(&self.key_prefix, key))
            .arg(owner)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::ScriptError {
                script: "lock_release",
                reason: e.to_string(),
            })?;

        let outcome = match reply {
            1 => ReleaseOutcome::Released,
            0 => ReleaseOutcome::StillHeld,
            _ => ReleaseOutcome::NotHeld,
        };
        debug!(key = key, owner = owner, outcome = ?outcome, "Redis lock RELEASE");
        Ok(outcome)
    }

    fn provider_name(&self) -> &'static str {
        "redis"
    }
}

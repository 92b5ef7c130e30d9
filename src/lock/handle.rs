//! Held-lock handle

use super::provider::LockProvider;
use super::traits::{DistributedLock, ReleaseOutcome};
use crate::store::StoreResult;
use tracing::warn;

/// One successful acquisition of a distributed lock.
///
/// Release it with [`LockHandle::release`]. A handle dropped while still
/// held schedules a release on the current Tokio runtime and logs a
/// warning; without a runtime the lease is left to expire.
#[derive(Debug)]
pub struct LockHandle {
    key: String,
    owner: String,
    held: bool,
    provider: LockProvider,
}

impl LockHandle {
    pub(crate) fn new(key: &str, owner: String, provider: LockProvider) -> Self {
        Self {
            key: key.to_string(),
            owner,
            held: true,
            provider,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Drop this hold
    pub async fn release(mut self) -> StoreResult<ReleaseOutcome> {
        self.held = false;
        self.provider.release(&self.key, &self.owner).await
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        warn!(key = %self.key, "Lock handle dropped while held, releasing in background");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "No runtime available, lock will expire with its lease");
            return;
        };
        let provider = self.provider.clone();
        let key = std::mem::take(&mut self.key);
        let owner = std::mem::take(&mut self.owner);
        runtime.spawn(async move {
            if let Err(e) = provider.release(&key, &owner).await {
                warn!(key = %key, error = %e, "Background lock release failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_dropped_handle_is_released_in_background() {
        let locks = LockProvider::memory(Duration::from_millis(5));
        {
            let handle = locks.lock("k", Duration::from_secs(30)).await.unwrap();
            assert!(handle.is_held());
        }

        // The blocking lock succeeds once the spawned release runs
        let reacquired =
            tokio::time::timeout(Duration::from_secs(1), locks.lock("k", Duration::from_secs(30)))
                .await
                .expect("background release should free the lock")
                .unwrap();
        assert_eq!(reacquired.key(), "k");
        reacquired.release().await.unwrap();
    }
}

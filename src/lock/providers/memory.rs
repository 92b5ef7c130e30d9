//! In-process lock provider
//!
//! Lock state lives in a mutex-guarded map; blocked acquirers park on a
//! per-key `Notify` and also wake when the current holder's lease runs out.
//! Locks whose lease ran out without a release are swept once the table
//! grows past a threshold.

use crate::lock::traits::{DistributedLock, ReleaseOutcome};
use crate::store::StoreResult;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::debug;

/// Table size at which taking a new lock first sweeps expired ones
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct LockState {
    owner: String,
    holds: u32,
    expires_at: Instant,
}

#[derive(Debug)]
struct LockTable {
    states: HashMap<String, LockState>,
    next_sweep_at: usize,
}

impl Default for LockTable {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
            next_sweep_at: SWEEP_THRESHOLD,
        }
    }
}

/// In-memory reentrant lock service
#[derive(Debug, Clone)]
pub struct MemoryLockService {
    locks: Arc<Mutex<LockTable>>,
    waiters: Arc<DashMap<String, Arc<Notify>>>,
    retry_interval: Duration,
}

impl Default for MemoryLockService {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl MemoryLockService {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            locks: Arc::new(Mutex::new(LockTable::default())),
            waiters: Arc::new(DashMap::new()),
            retry_interval,
        }
    }

    /// Current holder of a lock, if its lease is still live
    pub fn holder(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.locks
            .lock()
            .states
            .get(key)
            .filter(|state| state.expires_at > now)
            .map(|state| state.owner.clone())
    }

    fn try_take(&self, key: &str, owner: &str, lease: Duration) -> bool {
        let now = Instant::now();
        let mut table = self.locks.lock();
        match table.states.get_mut(key) {
            Some(state) if state.expires_at > now && state.owner != owner => false,
            Some(state) if state.expires_at > now => {
                state.holds += 1;
                state.expires_at = now + lease;
                true
            }
            _ => {
                table.states.insert(
                    key.to_string(),
                    LockState {
                        owner: owner.to_string(),
                        holds: 1,
                        expires_at: now + lease,
                    },
                );
                if table.states.len() >= table.next_sweep_at {
                    self.sweep(&mut table, now);
                }
                true
            }
        }
    }

    /// Drop leases that ran out without a release, and idle waiter slots
    fn sweep(&self, table: &mut LockTable, now: Instant) {
        let before = table.states.len();
        table.states.retain(|_, state| state.expires_at > now);
        table.next_sweep_at = (table.states.len() * 2).max(SWEEP_THRESHOLD);
        self.waiters.retain(|_, notify| Arc::strong_count(notify) > 1);
        debug!(
            removed = before - table.states.len(),
            remaining = table.states.len(),
            "Memory locks swept expired leases"
        );
    }

    /// Keys with a wakeup slot, parked on or not
    pub(crate) fn waiter_slots(&self) -> usize {
        self.waiters.len()
    }

    fn remaining_lease(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.locks
            .lock()
            .states
            .get(key)
            .map(|state| state.expires_at.saturating_duration_since(now))
    }
}

impl DistributedLock for MemoryLockService {
    async fn try_acquire(&self, key: &str, owner: &str, lease: Duration) -> StoreResult<bool> {
        let acquired = self.try_take(key, owner, lease);
        debug!(key = key, owner = owner, acquired = acquired, "Memory lock TRY");
        Ok(acquired)
    }

    async fn acquire(&self, key: &str, owner: &str, lease: Duration) -> StoreResult<()> {
        loop {
            let notify = self
                .waiters
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Notify::new()))
                .clone();
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register before trying so a release between the try and the
            // wait is not missed.
            notified.as_mut().enable();

            if self.try_take(key, owner, lease) {
                // Nobody else parked on this slot; a lease that later runs
                // out unreleased must not leave it behind
                self.waiters
                    .remove_if(key, |_, slot| Arc::strong_count(slot) <= 2);
                debug!(key = key, owner = owner, "Memory lock ACQUIRED");
                return Ok(());
            }

            let wait = self
                .remaining_lease(key)
                .unwrap_or(self.retry_interval)
                .max(Duration::from_millis(1));
            let _ = tokio::time::timeout(wait, notified).await;
        }
    }

    async fn release(&self, key: &str, owner: &str) -> StoreResult<ReleaseOutcome> {
        let now = Instant::now();
        let outcome = {
            let mut table = self.locks.lock();
            match table.states.get_mut(key) {
                Some(state) if state.owner == owner && state.expires_at > now => {
                    state.holds -= 1;
                    if state.holds == 0 {
                        table.states.remove(key);
                        ReleaseOutcome::Released
                    } else {
                        ReleaseOutcome::StillHeld
                    }
                }
                _ => ReleaseOutcome::NotHeld,
            }
        };

        if outcome == ReleaseOutcome::Released {
            if let Some((_, notify)) = self.waiters.remove(key) {
                notify.notify_waiters();
            }
        }
        debug!(key = key, owner = owner, outcome = ?outcome, "Memory lock RELEASE");
        Ok(outcome)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASE: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_try_acquire_is_exclusive_between_owners() {
        let locks = MemoryLockService::default();
        assert!(locks.try_acquire("k", "a", LEASE).await.unwrap());
        assert!(!locks.try_acquire("k", "b", LEASE).await.unwrap());
        assert_eq!(locks.holder("k"), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_reentrant_for_same_owner() {
        let locks = MemoryLockService::default();
        assert!(locks.try_acquire("k", "a", LEASE).await.unwrap());
        assert!(locks.try_acquire("k", "a", LEASE).await.unwrap());
        assert_eq!(locks.release("k", "a").await.unwrap(), ReleaseOutcome::StillHeld);
        assert!(!locks.try_acquire("k", "b", LEASE).await.unwrap());
        assert_eq!(locks.release("k", "a").await.unwrap(), ReleaseOutcome::Released);
        assert!(locks.try_acquire("k", "b", LEASE).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_by_non_owner_is_not_held() {
        let locks = MemoryLockService::default();
        locks.try_acquire("k", "a", LEASE).await.unwrap();
        assert_eq!(locks.release("k", "b").await.unwrap(), ReleaseOutcome::NotHeld);
        assert_eq!(locks.holder("k"), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_expired_lease_frees_the_lock() {
        let locks = MemoryLockService::default();
        locks
            .try_acquire("k", "a", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(locks.try_acquire("k", "b", LEASE).await.unwrap());
        assert_eq!(locks.release("k", "a").await.unwrap(), ReleaseOutcome::NotHeld);
    }

    #[tokio::test]
    async fn test_blocking_acquire_waits_for_release() {
        let locks = MemoryLockService::default();
        locks.try_acquire("k", "a", LEASE).await.unwrap();

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("k", "b", LEASE).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        locks.release("k", "a").await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap()
            .unwrap();
        assert_eq!(locks.holder("k"), Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_expired_lease_leaves_no_waiter_slot() {
        let locks = MemoryLockService::new(Duration::from_millis(5));
        locks
            .try_acquire("k", "a", Duration::from_millis(20))
            .await
            .unwrap();

        // "a" never releases; "b" gets in once the lease runs out
        tokio::time::timeout(Duration::from_secs(1), locks.acquire("k", "b", LEASE))
            .await
            .expect("expired lease should admit the waiter")
            .unwrap();
        assert_eq!(locks.holder("k"), Some("b".to_string()));
        assert_eq!(locks.waiter_slots(), 0);
    }

    #[tokio::test]
    async fn test_unreleased_leases_are_swept() {
        let locks = MemoryLockService::default();
        for i in 0..SWEEP_THRESHOLD - 1 {
            locks
                .try_acquire(&format!("k{i}"), "a", Duration::from_millis(200))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
        locks.try_acquire("fresh", "b", LEASE).await.unwrap();

        assert_eq!(locks.locks.lock().states.len(), 1);
        assert_eq!(locks.holder("fresh"), Some("b".to_string()));
    }
}

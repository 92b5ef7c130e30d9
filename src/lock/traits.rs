//! Distributed lock trait definition

use crate::store::StoreResult;
use std::time::Duration;

/// Outcome of a release call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The last hold was dropped and the lock is free
    Released,
    /// The owner still holds reentrant acquisitions
    StillHeld,
    /// The owner did not hold the lock (never acquired, or lease expired)
    NotHeld,
}

/// Named mutexes shared across the cluster.
///
/// Locks are reentrant per owner and always carry a lease: a holder that
/// crashes without releasing loses the lock when the lease runs out.
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock without waiting
    fn try_acquire(
        &self,
        key: &str,
        owner: &str,
        lease: Duration,
    ) -> impl std::future::Future<Output = StoreResult<bool>> + Send;

    /// Wait until the lock is available, then take it
    fn acquire(
        &self,
        key: &str,
        owner: &str,
        lease: Duration,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    /// Drop one hold of `owner` on `key`
    fn release(
        &self,
        key: &str,
        owner: &str,
    ) -> impl std::future::Future<Output = StoreResult<ReleaseOutcome>> + Send;

    /// Name of the lock provider
    fn provider_name(&self) -> &'static str;
}

//! Per-invocation context threaded through a strategy handler

use super::errors::IdempotentError;
use super::model::IdempotentStrategy;
use super::state::ExecutionPhase;
use crate::lock::LockHandle;
use crate::store::StoreProvider;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Everything a handler needs to commit or roll back one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationWrapper {
    pub key: String,
    pub strategy: IdempotentStrategy,
    pub timeout: Duration,
    pub message: String,
    pub target_type: String,
    pub method: String,
}

/// Scoped state of one protected call; consumed when the call ends.
///
/// A context dropped between acquire and finalize (the caller's future was
/// cancelled) gives up what it acquired: a held lock is released by its
/// handle, and a claimed store record is deleted in the background so the
/// next attempt can proceed. A context abandoned mid-commit leaves the
/// record to its lease, since the operation already succeeded.
#[derive(Debug)]
pub struct InvocationContext {
    wrapper: InvocationWrapper,
    lock: Option<LockHandle>,
    claim: Option<StoreProvider>,
    phase: ExecutionPhase,
    started_at: Instant,
}

impl InvocationContext {
    pub fn new(wrapper: InvocationWrapper) -> Self {
        Self {
            wrapper,
            lock: None,
            claim: None,
            phase: ExecutionPhase::Start,
            started_at: Instant::now(),
        }
    }

    pub fn wrapper(&self) -> &InvocationWrapper {
        &self.wrapper
    }

    pub fn key(&self) -> &str {
        &self.wrapper.key
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Move to `next`, rejecting transitions the state machine forbids
    pub fn advance(&mut self, next: ExecutionPhase) -> Result<(), IdempotentError> {
        if !self.phase.can_transition_to(next) {
            return Err(IdempotentError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        trace!(key = %self.wrapper.key, from = %self.phase, to = %next, "Invocation phase");
        self.phase = next;
        Ok(())
    }

    pub fn attach_lock(&mut self, handle: LockHandle) {
        self.lock = Some(handle);
    }

    pub fn take_lock(&mut self) -> Option<LockHandle> {
        self.lock.take()
    }

    pub fn holds_lock(&self) -> bool {
        self.lock.is_some()
    }

    /// Record that the wrapper key was claimed in `store`
    pub(crate) fn attach_claim(&mut self, store: StoreProvider) {
        self.claim = Some(store);
    }

    /// The claim is settled; nothing to undo on drop
    pub(crate) fn settle_claim(&mut self) {
        self.claim = None;
    }

    pub fn holds_claim(&self) -> bool {
        self.claim.is_some()
    }
}

impl Drop for InvocationContext {
    fn drop(&mut self) {
        let Some(store) = self.claim.take() else {
            return;
        };
        match self.phase {
            ExecutionPhase::Acquired | ExecutionPhase::Invoke | ExecutionPhase::Rollback => {}
            ExecutionPhase::Commit => {
                warn!(key = %self.wrapper.key, "Call abandoned while committing, claim left to expire");
                return;
            }
            _ => return,
        }
        warn!(
            key = %self.wrapper.key,
            phase = %self.phase,
            "Call abandoned before finalizing, removing claim in background"
        );

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.wrapper.key, "No runtime available, claim will expire with its lease");
            return;
        };
        let key = std::mem::take(&mut self.wrapper.key);
        runtime.spawn(async move {
            if let Err(e) = store.delete(&key).await {
                warn!(key = %key, error = %e, "Background claim removal failed");
            }
        });
    }
}

//! Idempotency error types

use super::state::ExecutionPhase;
use crate::store::StoreError;
use thiserror::Error;

/// Why a protected call was not (or could not be) executed
#[derive(Debug, Error)]
pub enum IdempotentError {
    /// Another caller holds the key
    #[error("{message} (key: {key})")]
    AlreadyInProgress { key: String, message: String },

    /// No token presented, or the token is unknown or expired
    #[error("Idempotency token missing: {reason}")]
    TokenMissing { reason: String },

    /// The token was already redeemed
    #[error("{message}")]
    TokenAlreadyConsumed { message: String },

    /// A previous delivery is still being processed; redeliver later
    #[error("Message {key} is still being consumed")]
    DuplicateRetryable { key: String },

    /// The message was already consumed; acknowledge and drop
    #[error("Message {key} was already consumed")]
    DuplicateTerminal { key: String },

    /// The key could not be derived from the call
    #[error("Idempotency key evaluation failed: {reason}")]
    KeyEvaluationFailed { reason: String },

    /// Store or lock provider unreachable
    #[error("Idempotency infrastructure error: {0}")]
    Infrastructure(#[from] StoreError),

    #[error("Invalid execution phase transition {from} -> {to}")]
    InvalidTransition {
        from: ExecutionPhase,
        to: ExecutionPhase,
    },
}

impl IdempotentError {
    /// Whether a message consumer should acknowledge the delivery
    ///
    /// Only a terminal duplicate is acknowledged; every other rejection
    /// leaves the message for redelivery.
    pub fn should_acknowledge(&self) -> bool {
        matches!(self, Self::DuplicateTerminal { .. })
    }

    /// Whether the rejection is the caller's fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInProgress { .. }
                | Self::TokenMissing { .. }
                | Self::TokenAlreadyConsumed { .. }
        )
    }

    pub fn key_evaluation(reason: impl Into<String>) -> Self {
        Self::KeyEvaluationFailed {
            reason: reason.into(),
        }
    }
}

/// Outcome of a protected call that did not succeed
#[derive(Debug, Error)]
pub enum ExecuteError<E> {
    /// The guard refused to run the operation
    #[error("Rejected by idempotency guard: {0}")]
    Rejected(#[source] IdempotentError),

    /// The operation ran and failed
    #[error("Protected operation failed: {0}")]
    Operation(E),
}

impl<E> ExecuteError<E> {
    pub fn rejection(&self) -> Option<&IdempotentError> {
        match self {
            Self::Rejected(err) => Some(err),
            Self::Operation(_) => None,
        }
    }

    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }
}

impl<E> From<IdempotentError> for ExecuteError<E> {
    fn from(err: IdempotentError) -> Self {
        Self::Rejected(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_terminal_duplicates_are_acknowledged() {
        let terminal = IdempotentError::DuplicateTerminal { key: "k".into() };
        let retry = IdempotentError::DuplicateRetryable { key: "k".into() };
        assert!(terminal.should_acknowledge());
        assert!(!retry.should_acknowledge());
        assert!(!IdempotentError::key_evaluation("x").should_acknowledge());
    }

    #[test]
    fn test_execute_error_accessors() {
        let rejected: ExecuteError<std::io::Error> =
            IdempotentError::TokenMissing { reason: "none".into() }.into();
        assert!(rejected.rejection().unwrap().is_client_error());
        assert!(rejected.into_operation().is_none());

        let failed: ExecuteError<&str> = ExecuteError::Operation("boom");
        assert_eq!(failed.to_string(), "Protected operation failed: boom");
    }
}

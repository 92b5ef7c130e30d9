//! Store error types

use thiserror::Error;

/// Errors raised by the shared key-value store and the lock provider.
///
/// Every variant is an infrastructure failure: the engine surfaces these
/// as-is and never treats them as "proceed without protection".
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the store backend
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    /// A command or script failed on the backend
    #[error("Store backend error: {0}")]
    BackendError(String),

    /// An atomic script returned a reply of an unexpected shape
    #[error("Store script error for {script}: {reason}")]
    ScriptError { script: &'static str, reason: String },

    /// Backend requested in configuration is not available in this build
    #[error("Store backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(feature = "store-redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            StoreError::ConnectionError(err.to_string())
        } else {
            StoreError::BackendError(err.to_string())
        }
    }
}

//! Cache facade error types

use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur during cache facade operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Store or lock provider failure
    #[error("Cache store error: {0}")]
    Store(#[from] StoreError),

    /// Failed to serialize or deserialize a cached value
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// The caller-supplied loader failed; nothing was cached
    #[error("Cache loader failed: {0}")]
    Loader(#[source] anyhow::Error),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for cache facade operations
pub type CacheResult<T> = Result<T, CacheError>;

//! Crate-level error aggregating every subsystem

use crate::cache::CacheError;
use crate::config::ConfigurationError;
use crate::idempotent::IdempotentError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Idempotent(#[from] IdempotentError),
}

pub type Result<T> = std::result::Result<T, DedupError>;

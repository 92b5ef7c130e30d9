//! Key-value store trait definition

use super::errors::StoreResult;
use super::scripts::{AtomicScript, ScriptReply};
use std::time::Duration;

/// Operations the engine needs from the shared store.
///
/// Implemented by concrete providers (Redis, in-memory). Plain reads and
/// writes are single commands; anything multi-step goes through [`eval`],
/// which must run the whole [`AtomicScript`] as one unit with no
/// intermediate state visible to other callers.
///
/// [`eval`]: KeyValueStore::eval
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key. `Ok(None)` on miss.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = StoreResult<Option<String>>> + Send;

    /// Set a value with a TTL, overwriting any previous value
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = StoreResult<()>> + Send;

    /// Delete a key. Returns whether the key existed.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = StoreResult<bool>> + Send;

    /// Delete several keys, returning how many existed
    fn delete_many(
        &self,
        keys: &[String],
    ) -> impl std::future::Future<Output = StoreResult<u64>> + Send;

    /// Count how many of `keys` currently exist
    fn count_existing(
        &self,
        keys: &[String],
    ) -> impl std::future::Future<Output = StoreResult<u64>> + Send;

    /// Reset the TTL of an existing key. Returns false when the key is absent.
    fn expire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = StoreResult<bool>> + Send;

    /// Remaining TTL of a key, `None` when absent or persistent
    fn ttl(&self, key: &str)
        -> impl std::future::Future<Output = StoreResult<Option<Duration>>> + Send;

    /// Execute one atomic script in a single round trip
    fn eval(
        &self,
        script: AtomicScript,
        keys: &[String],
        args: &[String],
    ) -> impl std::future::Future<Output = StoreResult<ScriptReply>> + Send;

    /// Check if the store backend is healthy
    fn health_check(&self) -> impl std::future::Future<Output = StoreResult<bool>> + Send;

    /// Name of the store provider
    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across processes
    fn is_distributed(&self) -> bool;
}

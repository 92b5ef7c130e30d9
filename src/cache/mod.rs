//! # Cache Facade
//!
//! Typed reads and writes over the shared store, the atomic conditional
//! writes, and `safe_get`: a read-through load that collapses concurrent
//! misses into a single loader call and short-circuits keys the bloom
//! filter has never seen.

pub mod errors;
pub mod facade;
pub mod keys;
pub mod options;

pub use errors::{CacheError, CacheResult};
pub use facade::{CacheFacade, SAFE_GET_LOCK_PREFIX};
pub use keys::{build_key, is_null_or_blank};
pub use options::SafeGetOptions;

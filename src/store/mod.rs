//! # Shared Key-Value Store
//!
//! The single source of truth for every deduplication and mutual-exclusion
//! decision the engine makes.
//!
//! ## Architecture
//!
//! ```text
//! StoreProvider (enum)           <- Zero-cost dispatch, no vtable
//!   ├── Redis(RedisStore)        <- ConnectionManager-based async Redis
//!   └── Memory(MemoryStore)      <- Single-process, mutex-guarded map
//! ```
//!
//! Multi-step commands never run as separate round trips: they go through
//! [`AtomicScriptLibrary`], which executes one [`AtomicScript`] per call.

pub mod errors;
pub mod provider;
pub mod providers;
pub mod scripts;
pub mod traits;

pub use errors::{StoreError, StoreResult};
pub use provider::StoreProvider;
pub use providers::MemoryStore;
pub use scripts::{AtomicScript, AtomicScriptLibrary, ScriptReply};
pub use traits::KeyValueStore;

#[cfg(feature = "store-redis")]
pub use providers::RedisStore;

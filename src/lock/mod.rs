//! # Distributed Locks
//!
//! Named, reentrant, lease-bound mutexes. Every holder gets a per-call owner
//! token; a crashed holder loses the lock when its lease runs out.
//!
//! ```text
//! LockProvider (enum)
//!   ├── Redis(RedisLockService)   <- Lua acquire/release on a hash
//!   └── Memory(MemoryLockService) <- mutex-guarded map + Notify wakeups
//! ```

pub mod handle;
pub mod provider;
pub mod providers;
pub mod traits;

pub use handle::LockHandle;
pub use provider::LockProvider;
pub use providers::MemoryLockService;
pub use traits::{DistributedLock, ReleaseOutcome};

#[cfg(feature = "store-redis")]
pub use providers::RedisLockService;

//! Lock provider implementations

pub mod memory;

#[cfg(feature = "store-redis")]
pub mod redis;

pub use memory::MemoryLockService;

#[cfg(feature = "store-redis")]
pub use self::redis::RedisLockService;

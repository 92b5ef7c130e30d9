//! Store provider implementations

pub mod memory;

#[cfg(feature = "store-redis")]
pub mod redis;

pub use memory::MemoryStore;

#[cfg(feature = "store-redis")]
pub use self::redis::RedisStore;

//! Atomic script library
//!
//! Four multi-step commands that must execute as a single unit against the
//! shared store. On Redis each one is a Lua script (one `EVALSHA` round trip);
//! the in-memory provider runs them under a single mutex acquisition.
//!
//! ```text
//! put_if_absent          EXISTS? no  -> SET PX            -> 1 / 0
//! put_if_exists          EXISTS? yes -> SET PX            -> 1 / 0
//! put_if_all_absent      all EXISTS? no -> SET PX (each)  -> 1 / 0
//! set_if_absent_and_get  GET? nil -> SET PX -> nil, else -> previous
//! ```

use super::errors::{StoreError, StoreResult};
use super::provider::StoreProvider;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Value written for every key claimed by `put_if_all_absent`
pub const ALL_ABSENT_PLACEHOLDER: &str = "";

/// The closed set of scripted commands the engine relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicScript {
    PutIfAbsent,
    PutIfExists,
    PutIfAllAbsent,
    SetIfAbsentAndGet,
}

impl AtomicScript {
    /// Lua source executed by script-capable backends
    pub fn source(&self) -> &'static str {
        match self {
            Self::PutIfAbsent => include_str!("lua/put_if_absent.lua"),
            Self::PutIfExists => include_str!("lua/put_if_exists.lua"),
            Self::PutIfAllAbsent => include_str!("lua/put_if_all_absent.lua"),
            Self::SetIfAbsentAndGet => include_str!("lua/set_if_absent_and_get.lua"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PutIfAbsent => "put_if_absent",
            Self::PutIfExists => "put_if_exists",
            Self::PutIfAllAbsent => "put_if_all_absent",
            Self::SetIfAbsentAndGet => "set_if_absent_and_get",
        }
    }

    /// Whether the script replies with a boolean flag rather than a value
    pub fn returns_flag(&self) -> bool {
        !matches!(self, Self::SetIfAbsentAndGet)
    }
}

impl fmt::Display for AtomicScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reply of an atomic script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply {
    Flag(bool),
    Value(Option<String>),
}

impl ScriptReply {
    fn into_flag(self, script: AtomicScript) -> StoreResult<bool> {
        match self {
            Self::Flag(flag) => Ok(flag),
            Self::Value(other) => Err(StoreError::ScriptError {
                script: script.name(),
                reason: format!("expected a flag reply, got value {other:?}"),
            }),
        }
    }

    fn into_value(self, script: AtomicScript) -> StoreResult<Option<String>> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Flag(flag) => Err(StoreError::ScriptError {
                script: script.name(),
                reason: format!("expected a value reply, got flag {flag}"),
            }),
        }
    }
}

/// Convert a TTL to the millisecond argument the scripts expect (minimum 1ms)
pub fn ttl_millis(ttl: Duration) -> u64 {
    let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    ms.max(1)
}

/// Typed entry points for the four atomic commands
#[derive(Debug, Clone)]
pub struct AtomicScriptLibrary {
    store: StoreProvider,
}

impl AtomicScriptLibrary {
    pub fn new(store: StoreProvider) -> Self {
        Self { store }
    }

    /// Set `value` only if `key` is absent
    pub async fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let script = AtomicScript::PutIfAbsent;
        let stored = self
            .store
            .eval(script, &[key.to_string()], &[value.to_string(), ttl_millis(ttl).to_string()])
            .await?
            .into_flag(script)?;
        debug!(key = key, stored = stored, "put_if_absent");
        Ok(stored)
    }

    /// Set `value` and refresh the TTL only if `key` exists
    pub async fn put_if_exists(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let script = AtomicScript::PutIfExists;
        let stored = self
            .store
            .eval(script, &[key.to_string()], &[value.to_string(), ttl_millis(ttl).to_string()])
            .await?
            .into_flag(script)?;
        debug!(key = key, stored = stored, "put_if_exists");
        Ok(stored)
    }

    /// Claim every key at once, or none of them
    pub async fn put_if_all_absent(&self, keys: &[String], ttl: Duration) -> StoreResult<bool> {
        if keys.is_empty() {
            return Ok(true);
        }
        let script = AtomicScript::PutIfAllAbsent;
        let stored = self
            .store
            .eval(
                script,
                keys,
                &[ALL_ABSENT_PLACEHOLDER.to_string(), ttl_millis(ttl).to_string()],
            )
            .await?
            .into_flag(script)?;
        debug!(keys = ?keys, stored = stored, "put_if_all_absent");
        Ok(stored)
    }

    /// Write `value` if absent and return `None`, otherwise return the
    /// existing value and write nothing
    pub async fn set_if_absent_and_get(
        &self,
        key: &str,
        value: &str,
        ttl_ms: u64,
    ) -> StoreResult<Option<String>> {
        let script = AtomicScript::SetIfAbsentAndGet;
        let previous = self
            .store
            .eval(script, &[key.to_string()], &[value.to_string(), ttl_ms.max(1).to_string()])
            .await?
            .into_value(script)?;
        debug!(key = key, claimed = previous.is_none(), "set_if_absent_and_get");
        Ok(previous)
    }
}

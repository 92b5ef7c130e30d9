//! In-process store provider
//!
//! Keeps entries in a mutex-guarded map. Expired entries are dropped when
//! read, and swept in bulk once the map grows past a threshold. Every
//! atomic script runs under one lock acquisition, which gives the same
//! no-interleaving guarantee Lua scripts give on Redis, but only within a
//! single process. Use it for tests and single-instance deployments.

use crate::store::errors::StoreResult;
use crate::store::scripts::{ttl_millis, AtomicScript, ScriptReply};
use crate::store::traits::KeyValueStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Map size at which a write first sweeps expired entries
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    /// TTLs are floored to 1ms, matching the Redis scripts
    fn new(value: String, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + Duration::from_millis(ttl_millis(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct Entries {
    map: HashMap<String, MemoryEntry>,
    next_sweep_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            next_sweep_at: SWEEP_THRESHOLD,
        }
    }
}

impl Entries {
    /// Drop expired entries once the map outgrows the last sweep
    fn sweep_if_due(&mut self) {
        if self.map.len() < self.next_sweep_at {
            return;
        }
        let before = self.map.len();
        let now = Instant::now();
        self.map.retain(|_, entry| !entry.is_expired(now));
        self.next_sweep_at = (self.map.len() * 2).max(SWEEP_THRESHOLD);
        debug!(
            removed = before - self.map.len(),
            remaining = self.map.len(),
            "Memory store swept expired entries"
        );
    }

    fn insert(&mut self, key: String, entry: MemoryEntry) {
        self.map.insert(key, entry);
        self.sweep_if_due();
    }
}

/// In-memory store with per-key TTL
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Entries>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries (expired entries are purged first)
    pub fn len(&self) -> usize {
        let mut guard = self.inner.lock();
        let now = Instant::now();
        guard.map.retain(|_, entry| !entry.is_expired(now));
        guard.map.len()
    }

    /// Entries held, including expired ones not yet swept
    fn stored(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live<'a>(entries: &'a mut Entries, key: &str) -> Option<&'a MemoryEntry> {
        let now = Instant::now();
        if entries.map.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.map.remove(key);
        }
        entries.map.get(key)
    }

    fn parse_ttl(arg: Option<&String>) -> Duration {
        arg.and_then(|raw| raw.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO)
    }

    fn run_script(
        map: &mut Entries,
        script: AtomicScript,
        keys: &[String],
        args: &[String],
    ) -> ScriptReply {
        let value = args.first().cloned().unwrap_or_default();
        let ttl = Self::parse_ttl(args.get(1));

        match script {
            AtomicScript::PutIfAbsent => {
                let Some(key) = keys.first() else {
                    return ScriptReply::Flag(false);
                };
                if Self::live(map, key).is_some() {
                    return ScriptReply::Flag(false);
                }
                map.insert(key.clone(), MemoryEntry::new(value, ttl));
                ScriptReply::Flag(true)
            }
            AtomicScript::PutIfExists => {
                let Some(key) = keys.first() else {
                    return ScriptReply::Flag(false);
                };
                if Self::live(map, key).is_none() {
                    return ScriptReply::Flag(false);
                }
                map.insert(key.clone(), MemoryEntry::new(value, ttl));
                ScriptReply::Flag(true)
            }
            AtomicScript::PutIfAllAbsent => {
                if keys.iter().any(|key| Self::live(map, key).is_some()) {
                    return ScriptReply::Flag(false);
                }
                for key in keys {
                    map.insert(key.clone(), MemoryEntry::new(value.clone(), ttl));
                }
                ScriptReply::Flag(true)
            }
            AtomicScript::SetIfAbsentAndGet => {
                let Some(key) = keys.first() else {
                    return ScriptReply::Value(None);
                };
                if let Some(existing) = Self::live(map, key) {
                    return ScriptReply::Value(Some(existing.value.clone()));
                }
                map.insert(key.clone(), MemoryEntry::new(value, ttl));
                ScriptReply::Value(None)
            }
        }
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut guard = self.inner.lock();
        Ok(Self::live(&mut guard, key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.inner
            .lock()
            .insert(key.to_string(), MemoryEntry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut guard = self.inner.lock();
        let existed = Self::live(&mut guard, key).is_some();
        guard.map.remove(key);
        Ok(existed)
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<u64> {
        let mut guard = self.inner.lock();
        let mut deleted = 0;
        for key in keys {
            if Self::live(&mut guard, key).is_some() {
                guard.map.remove(key);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn count_existing(&self, keys: &[String]) -> StoreResult<u64> {
        let mut guard = self.inner.lock();
        let count = keys
            .iter()
            .filter(|key| Self::live(&mut guard, key).is_some())
            .count();
        Ok(count as u64)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut guard = self.inner.lock();
        if Self::live(&mut guard, key).is_none() {
            return Ok(false);
        }
        if let Some(entry) = guard.map.get_mut(key) {
            entry.expires_at = Instant::now() + Duration::from_millis(ttl_millis(ttl));
        }
        Ok(true)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut guard = self.inner.lock();
        let now = Instant::now();
        Ok(Self::live(&mut guard, key).map(|entry| entry.expires_at.saturating_duration_since(now)))
    }

    async fn eval(
        &self,
        script: AtomicScript,
        keys: &[String],
        args: &[String],
    ) -> StoreResult<ScriptReply> {
        let reply = {
            let mut guard = self.inner.lock();
            Self::run_script(&mut guard, script, keys, args)
        };
        debug!(script = %script, keys = ?keys, reply = ?reply, "Memory script EVAL");
        Ok(reply)
    }

    async fn health_check(&self) -> StoreResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ttl_arg(ms: u64) -> String {
        ms.to_string()
    }

    #[tokio::test]
    async fn test_memory_set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_entries_expire() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_zero_ttl_expires_immediately() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.get("k").await.unwrap(), None);

        let keys = vec!["claim".to_string()];
        let args = vec!["consuming".to_string()];
        store.eval(AtomicScript::SetIfAbsentAndGet, &keys, &args).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.ttl("claim").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_sweeps_expired_entries_on_write() {
        let store = MemoryStore::new();
        for i in 0..SWEEP_THRESHOLD - 1 {
            store
                .set(&format!("short:{i}"), "v", Duration::from_millis(200))
                .await
                .unwrap();
        }
        store.set("long:0", "v", Duration::from_secs(60)).await.unwrap();
        // The write that reached the threshold found nothing expired yet
        assert_eq!(store.stored(), SWEEP_THRESHOLD);

        tokio::time::sleep(Duration::from_millis(250)).await;
        for i in 0..SWEEP_THRESHOLD {
            store
                .set(&format!("long:{}", i + 1), "v", Duration::from_secs(60))
                .await
                .unwrap();
        }
        // Every short-lived key was dropped without ever being read
        assert_eq!(store.stored(), SWEEP_THRESHOLD + 1);
    }

    #[tokio::test]
    async fn test_memory_put_if_exists_refreshes_only_existing() {
        let store = MemoryStore::new();
        let keys = vec!["k".to_string()];
        let args = vec!["v".to_string(), ttl_arg(1000)];

        let reply = store.eval(AtomicScript::PutIfExists, &keys, &args).await.unwrap();
        assert_eq!(reply, ScriptReply::Flag(false));
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "old", Duration::from_millis(50)).await.unwrap();
        let reply = store.eval(AtomicScript::PutIfExists, &keys, &args).await.unwrap();
        assert_eq!(reply, ScriptReply::Flag(true));
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        let remaining = store.ttl("k").await.unwrap().unwrap();
        assert!(remaining > Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_memory_put_if_all_absent_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.set("a", "keep", Duration::from_secs(60)).await.unwrap();
        let keys = vec!["a".to_string(), "b".to_string()];
        let args = vec![String::new(), ttl_arg(1000)];

        let reply = store.eval(AtomicScript::PutIfAllAbsent, &keys, &args).await.unwrap();
        assert_eq!(reply, ScriptReply::Flag(false));
        assert_eq!(store.get("a").await.unwrap(), Some("keep".to_string()));
        assert_eq!(store.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_count_existing() {
        let store = MemoryStore::new();
        store.set("a", "1", Duration::from_secs(60)).await.unwrap();
        store.set("b", "2", Duration::from_secs(60)).await.unwrap();
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(store.count_existing(&keys).await.unwrap(), 2);
        assert_eq!(store.delete_many(&keys).await.unwrap(), 2);
        assert_eq!(store.count_existing(&keys).await.unwrap(), 0);
    }
}

//! # Cache Manager
//!
//! Two-tier cache for query results:
//!
//! - **Memory tier**: bounded to `capacity` entries. When full, the entry that
//!   was *inserted* earliest is evicted (a ring over insertion order). Reads
//!   do not move an entry, so this is deliberately not an LRU.
//! - **Durable tier**: the key/value store, under `cache_` + key. Survives
//!   restarts when the store is file-backed. A durable hit is promoted into the
//!   memory tier.
//!
//! Entries expire when `now - timestamp >= ttl`. Expired entries are removed
//! lazily on read and by [`CacheManager::sweep_expired`], which also drops
//! durable entries that no longer parse.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::backend::clock::SharedClock;
use crate::backend::storage::traits::KeyValueStorage;

/// Prefix of cache keys in the durable tier
pub const CACHE_PREFIX: &str = "cache_";

/// Default number of entries kept in memory
pub const DEFAULT_MEMORY_CAPACITY: usize = 100;

/// One cached value with its write time and lifetime (both in milliseconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    pub timestamp: i64,
    pub ttl: u64,
}

impl CacheEntry {
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis.saturating_sub(self.timestamp) < self.ttl as i64
    }
}

/// Entry counts per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub durable_entries: usize,
}

struct MemoryTier {
    entries: HashMap<String, CacheEntry>,
    insertion_order: VecDeque<String>,
    capacity: usize,
}

impl MemoryTier {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert (or re-insert) an entry at the newest end of the ring
    fn insert(&mut self, key: &str, entry: CacheEntry) {
        if self.entries.contains_key(key) {
            self.insertion_order.retain(|k| k != key);
        }
        self.entries.insert(key.to_string(), entry);
        self.insertion_order.push_back(key.to_string());

        while self.entries.len() > self.capacity {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    debug!("Evicted '{}' from memory cache", oldest);
                }
                None => break,
            }
        }
    }

    fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.insertion_order.retain(|k| k != key);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.insertion_order.iter().cloned().collect()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }
}

/// Cache manager shared by the data service
pub struct CacheManager {
    memory: Mutex<MemoryTier>,
    durable: Arc<dyn KeyValueStorage>,
    clock: SharedClock,
}

impl CacheManager {
    pub fn new(durable: Arc<dyn KeyValueStorage>, clock: SharedClock) -> Self {
        Self::with_capacity(durable, clock, DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(durable: Arc<dyn KeyValueStorage>, clock: SharedClock, capacity: usize) -> Self {
        Self {
            memory: Mutex::new(MemoryTier::new(capacity)),
            durable,
            clock,
        }
    }

    /// Build a deterministic key from a collection name and query options
    ///
    /// Options are sorted by name and rendered as `name=value` pairs joined by
    /// `&`, so the result does not depend on insertion order.
    pub fn generate_key(collection: &str, options: &serde_json::Map<String, Value>) -> String {
        if options.is_empty() {
            return collection.to_string();
        }

        let mut pairs: Vec<(&String, &Value)> = options.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let rendered = pairs
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => format!("{}={}", name, s),
                other => format!("{}={}", name, other),
            })
            .collect::<Vec<_>>()
            .join("&");

        format!("{}:{}", collection, rendered)
    }

    /// Look up a key; `None` on miss or expiry
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now_millis();

        {
            let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = memory.get(key) {
                if entry.is_valid_at(now) {
                    return Some(entry.data.clone());
                }
                debug!("Memory cache entry '{}' expired", key);
                memory.remove(key);
                self.remove_durable(key);
                return None;
            }
        }

        let entry = self.read_durable(key)?;
        if !entry.is_valid_at(now) {
            debug!("Durable cache entry '{}' expired", key);
            self.remove_durable(key);
            return None;
        }

        let data = entry.data.clone();
        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
        Some(data)
    }

    /// Store a value in both tiers
    pub fn set(&self, key: &str, data: Value, ttl: Duration) {
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_millis(),
            ttl: ttl.as_millis() as u64,
        };

        match serde_json::to_string(&entry) {
            Ok(serialized) => {
                if let Err(e) = self.durable.set_item(&durable_key(key), &serialized) {
                    warn!("Could not persist cache entry '{}': {}", key, e);
                }
            }
            Err(e) => warn!("Could not serialize cache entry '{}': {}", key, e),
        }

        self.memory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry);
    }

    /// Remove every entry whose key starts with `prefix`; returns how many keys went
    pub fn invalidate_collection(&self, prefix: &str) -> usize {
        let mut removed = 0;

        {
            let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            for key in memory.keys() {
                if key.starts_with(prefix) {
                    memory.remove(&key);
                    removed += 1;
                }
            }
        }

        let durable_prefix = durable_key(prefix);
        for key in self.durable_keys() {
            if key.starts_with(&durable_prefix) {
                if let Err(e) = self.durable.remove_item(&key) {
                    warn!("Could not remove cache entry '{}': {}", key, e);
                }
                removed += 1;
            }
        }

        debug!("Invalidated cache entries with prefix '{}'", prefix);
        removed
    }

    /// Drop expired and unparseable entries from the durable tier (and expired ones from memory)
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut dropped = 0;

        for key in self.durable_keys() {
            let keep = match self.durable.get_item(&key) {
                Ok(Some(raw)) => match serde_json::from_str::<CacheEntry>(&raw) {
                    Ok(entry) => entry.is_valid_at(now),
                    Err(_) => false,
                },
                Ok(None) => true,
                Err(e) => {
                    warn!("Could not read cache entry '{}' during sweep: {}", key, e);
                    true
                }
            };

            if !keep {
                if let Err(e) = self.durable.remove_item(&key) {
                    warn!("Could not remove cache entry '{}': {}", key, e);
                }
                dropped += 1;
            }
        }

        let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
        for key in memory.keys() {
            let expired = memory.get(&key).map(|e| !e.is_valid_at(now)).unwrap_or(false);
            if expired {
                memory.remove(&key);
            }
        }

        if dropped > 0 {
            info!("🧹 Cache sweep removed {} durable entries", dropped);
        }
        dropped
    }

    /// Run [`sweep_expired`](Self::sweep_expired) on a fixed interval
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.sweep_expired();
            }
        })
    }

    /// Remove everything from both tiers
    pub fn clear(&self) {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner).clear();
        for key in self.durable_keys() {
            if let Err(e) = self.durable.remove_item(&key) {
                warn!("Could not remove cache entry '{}': {}", key, e);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entries: self.memory.lock().unwrap_or_else(PoisonError::into_inner).entries.len(),
            durable_entries: self.durable_keys().len(),
        }
    }

    fn read_durable(&self, key: &str) -> Option<CacheEntry> {
        match self.durable.get_item(&durable_key(key)) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Dropping unreadable cache entry '{}': {}", key, e);
                    self.remove_durable(key);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read cache entry '{}': {}", key, e);
                None
            }
        }
    }

    fn remove_durable(&self, key: &str) {
        if let Err(e) = self.durable.remove_item(&durable_key(key)) {
            warn!("Could not remove cache entry '{}': {}", key, e);
        }
    }

    fn durable_keys(&self) -> Vec<String> {
        match self.durable.keys() {
            Ok(keys) => keys.into_iter().filter(|k| k.starts_with(CACHE_PREFIX)).collect(),
            Err(e) => {
                warn!("Could not list cache entries: {}", e);
                Vec::new()
            }
        }
    }
}

fn durable_key(key: &str) -> String {
    format!("{}{}", CACHE_PREFIX, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::clock::ManualClock;
    use crate::backend::storage::kv::MemoryStorage;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(60);

    fn setup_test_cache(capacity: usize) -> (CacheManager, Arc<MemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new(1_700_000_000_000);
        let cache = CacheManager::with_capacity(storage.clone(), clock.clone(), capacity);
        (cache, storage, clock)
    }

    fn options(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_generate_key_is_order_independent() {
        let mut ab = serde_json::Map::new();
        ab.insert("a".to_string(), json!(1));
        ab.insert("b".to_string(), json!(2));
        let mut ba = serde_json::Map::new();
        ba.insert("b".to_string(), json!(2));
        ba.insert("a".to_string(), json!(1));

        assert_eq!(CacheManager::generate_key("orders", &ab), CacheManager::generate_key("orders", &ba));
        assert_eq!(CacheManager::generate_key("orders", &ab), "orders:a=1&b=2");
    }

    #[test]
    fn test_generate_key_formats() {
        assert_eq!(CacheManager::generate_key("orders", &serde_json::Map::new()), "orders");
        assert_eq!(
            CacheManager::generate_key("orders", &options(json!({"orderBy": "createdAt", "limit": 10}))),
            "orders:limit=10&orderBy=createdAt"
        );
    }

    #[test]
    fn test_get_before_and_after_ttl() {
        let (cache, _, clock) = setup_test_cache(10);
        cache.set("orders", json!([{"id": "o1"}]), TTL);

        clock.advance(59_999);
        assert_eq!(cache.get("orders"), Some(json!([{"id": "o1"}])));

        clock.advance(1);
        assert_eq!(cache.get("orders"), None);
        // Expired entry is purged from both tiers
        assert_eq!(cache.stats(), CacheStats { memory_entries: 0, durable_entries: 0 });
    }

    #[test]
    fn test_durable_hit_is_promoted() {
        let (cache, storage, clock) = setup_test_cache(10);
        cache.set("orders", json!([1, 2]), TTL);

        // A fresh manager over the same storage only has the durable tier
        let reopened = CacheManager::with_capacity(storage, clock, 10);
        assert_eq!(reopened.stats().memory_entries, 0);
        assert_eq!(reopened.get("orders"), Some(json!([1, 2])));
        assert_eq!(reopened.stats().memory_entries, 1);
    }

    #[test]
    fn test_memory_tier_evicts_by_insertion_not_access() {
        let (cache, storage, _) = setup_test_cache(2);
        cache.set("a", json!("A"), TTL);
        cache.set("b", json!("B"), TTL);

        // Reading "a" does not protect it: it is still the oldest insertion
        assert_eq!(cache.get("a"), Some(json!("A")));
        cache.set("c", json!("C"), TTL);

        assert_eq!(cache.stats().memory_entries, 2);
        let memory_keys = cache.memory.lock().unwrap().keys();
        assert_eq!(memory_keys, vec!["b".to_string(), "c".to_string()]);

        // The evicted entry is still served from the durable tier
        assert!(storage.get_item("cache_a").unwrap().is_some());
        assert_eq!(cache.get("a"), Some(json!("A")));
    }

    #[test]
    fn test_invalidate_collection_leaves_other_collections() {
        let (cache, _, _) = setup_test_cache(10);
        cache.set("orders", json!(1), TTL);
        cache.set("orders:limit=5", json!(2), TTL);
        cache.set("customers:limit=5", json!(3), TTL);

        let removed = cache.invalidate_collection("orders");
        assert!(removed >= 2);

        assert_eq!(cache.get("orders"), None);
        assert_eq!(cache.get("orders:limit=5"), None);
        assert_eq!(cache.get("customers:limit=5"), Some(json!(3)));
    }

    #[test]
    fn test_sweep_drops_expired_and_corrupt_entries() {
        let (cache, storage, clock) = setup_test_cache(10);
        cache.set("short", json!(1), Duration::from_secs(1));
        cache.set("long", json!(2), Duration::from_secs(3600));
        storage.set_item("cache_broken", "{oops").unwrap();
        storage.set_item("orders", "[]").unwrap();

        clock.advance(5_000);
        let dropped = cache.sweep_expired();
        assert_eq!(dropped, 2);

        assert!(storage.get_item("cache_short").unwrap().is_none());
        assert!(storage.get_item("cache_broken").unwrap().is_none());
        assert!(storage.get_item("cache_long").unwrap().is_some());
        // Non-cache keys are never touched
        assert!(storage.get_item("orders").unwrap().is_some());
        assert_eq!(cache.get("long"), Some(json!(2)));
    }

    #[test]
    fn test_clear() {
        let (cache, storage, _) = setup_test_cache(10);
        cache.set("orders", json!(1), TTL);
        storage.set_item("orders", "[]").unwrap();

        cache.clear();
        assert_eq!(cache.stats(), CacheStats { memory_entries: 0, durable_entries: 0 });
        assert!(storage.get_item("orders").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_spawned_sweeper_runs_periodically() {
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::new(0);
        let cache = Arc::new(CacheManager::new(storage.clone(), clock.clone()));
        cache.set("orders", json!(1), Duration::from_millis(10));
        clock.advance(100);

        let handle = cache.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(storage.get_item("cache_orders").unwrap().is_none());
        handle.abort();
    }
}

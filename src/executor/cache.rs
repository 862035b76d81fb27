//! Per-record cache for file-backed execution
//!
//! Explicit, injectable component: constructed once by the caller with a
//! declared TTL and capacity policy, then shared across executors and
//! in-flight queries. Eviction is a coarse synchronous sweep at the start
//! of each query, not a background process.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::debug;

use crate::query::SchemaRef;

/// Default time-to-live for cached records.
const DEFAULT_TTL_SECONDS: i64 = 5 * 60;
/// Default soft capacity.
const DEFAULT_CAPACITY: usize = 10_000;
/// When capacity is exceeded, evict down to this many entries below it.
const EVICTION_HEADROOM: usize = 100;

struct CacheEntry {
    record: Value,
    inserted_at: DateTime<Utc>,
}

/// TTL + soft-capacity cache keyed by (schema, id).
///
/// Safe for concurrent read/write from multiple in-flight queries.
pub struct RecordCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<(SchemaRef, String), CacheEntry>>,
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECONDS), DEFAULT_CAPACITY)
    }
}

impl RecordCache {
    /// Creates a cache with the given TTL and soft capacity.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Removes every entry past its TTL.
    pub fn sweep_expired(&self) {
        let cutoff = Utc::now() - self.ttl;
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at > cutoff);
        let swept = before - entries.len();
        if swept > 0 {
            debug!(swept, remaining = entries.len(), "cache sweep");
        }
    }

    /// Returns the cached record, if present and fresh.
    ///
    /// An entry past its TTL is treated as a miss even between sweeps.
    pub fn get(&self, schema: &SchemaRef, id: &str) -> Option<Value> {
        let entries = self.entries.lock().expect("cache lock poisoned");
        let entry = entries.get(&(schema.clone(), id.to_string()))?;
        if Utc::now() - entry.inserted_at > self.ttl {
            return None;
        }
        Some(entry.record.clone())
    }

    /// Caches a record, evicting oldest entries when over capacity.
    pub fn insert(&self, schema: &SchemaRef, id: &str, record: Value) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(
            (schema.clone(), id.to_string()),
            CacheEntry {
                record,
                inserted_at: Utc::now(),
            },
        );

        if entries.len() > self.capacity {
            let target = self.capacity.saturating_sub(EVICTION_HEADROOM);
            let evict_count = entries.len() - target;
            let mut by_age: Vec<((SchemaRef, String), DateTime<Utc>)> = entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, inserted_at)| *inserted_at);
            for (key, _) in by_age.into_iter().take(evict_count) {
                entries.remove(&key);
            }
            debug!(evicted = evict_count, remaining = entries.len(), "cache eviction");
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Returns true when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> SchemaRef {
        SchemaRef::new("accounts")
    }

    #[test]
    fn test_get_after_insert() {
        let cache = RecordCache::default();
        cache.insert(&schema(), "id-1", json!({"name": "Alice"}));
        assert_eq!(cache.get(&schema(), "id-1"), Some(json!({"name": "Alice"})));
        assert_eq!(cache.get(&schema(), "id-2"), None);
    }

    #[test]
    fn test_expired_entry_misses() {
        let cache = RecordCache::new(Duration::milliseconds(-1), 100);
        cache.insert(&schema(), "id-1", json!({}));
        // Already past TTL: the read misses even before a sweep.
        assert_eq!(cache.get(&schema(), "id-1"), None);
        assert_eq!(cache.len(), 1);

        cache.sweep_expired();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_sweep_keeps_fresh_entries() {
        let cache = RecordCache::new(Duration::minutes(5), 100);
        cache.insert(&schema(), "id-1", json!({}));
        cache.sweep_expired();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_eviction_lands_below_capacity() {
        let cache = RecordCache::new(Duration::minutes(5), 200);
        for i in 0..201 {
            cache.insert(&schema(), &format!("id-{i}"), json!(i));
        }
        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_eviction_removes_oldest_first() {
        let cache = RecordCache::new(Duration::minutes(5), 200);
        cache.insert(&schema(), "oldest", json!(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        for i in 0..200 {
            cache.insert(&schema(), &format!("id-{i}"), json!(i));
        }
        assert!(cache.get(&schema(), "oldest").is_none());
    }

    #[test]
    fn test_keys_are_schema_scoped() {
        let cache = RecordCache::default();
        cache.insert(&SchemaRef::new("a"), "id-1", json!("from-a"));
        cache.insert(&SchemaRef::new("b"), "id-1", json!("from-b"));
        assert_eq!(cache.get(&SchemaRef::new("a"), "id-1"), Some(json!("from-a")));
        assert_eq!(cache.get(&SchemaRef::new("b"), "id-1"), Some(json!("from-b")));
    }
}

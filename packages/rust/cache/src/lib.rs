//! In-memory TTL cache for query results.
//!
//! [`CacheManager`] is a generic, capacity-bounded key/value store with
//! per-entry TTLs and hit/miss statistics. [`QueryCache`] wraps one with
//! prefixed keys and a TTL per query kind.

mod query_cache;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use riskbase_shared::{Result, RiskbaseError};
use serde::Serialize;
use tracing::debug;

pub use query_cache::{CacheValue, CachedQuery, QueryCache, QueryKind};

/// TTL applied when `set` is called without one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Maximum number of entries held by default.
pub const DEFAULT_CAPACITY: usize = 1000;

struct CacheEntry<T> {
    data: T,
    inserted_at: Instant,
    /// Insertion sequence; orders entries inserted within the same instant.
    seq: u64,
    ttl: Duration,
    hits: u64,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

struct Inner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    hits: u64,
    misses: u64,
    next_seq: u64,
}

/// Hit/miss counters and current size.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 when nothing was requested.
    pub hit_rate: f64,
    pub size: usize,
}

/// Capacity-bounded TTL cache with interior locking.
///
/// Eviction is by insertion order: when full, expired entries are purged
/// first, then the oldest inserted entry is dropped.
pub struct CacheManager<T> {
    inner: Mutex<Inner<T>>,
    capacity: usize,
    default_ttl: Duration,
}

impl<T: Clone> Default for CacheManager<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl<T: Clone> CacheManager<T> {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                next_seq: 0,
            }),
            capacity: capacity.max(1),
            default_ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<T>>> {
        self.inner
            .lock()
            .map_err(|_| RiskbaseError::Cache("cache lock poisoned".into()))
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, value: T, ttl: Option<Duration>) -> Result<()> {
        let mut inner = self.lock()?;
        let now = Instant::now();

        if !inner.entries.contains_key(key) && inner.entries.len() >= self.capacity {
            inner.entries.retain(|_, e| !e.is_expired(now));
            if inner.entries.len() >= self.capacity {
                let oldest = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| (e.inserted_at, e.seq))
                    .map(|(k, e)| (k.clone(), e.hits));
                if let Some((oldest, hits)) = oldest {
                    debug!(key = %oldest, hits, "evicting oldest cache entry");
                    inner.entries.remove(&oldest);
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                data: value,
                inserted_at: now,
                seq,
                ttl: ttl.unwrap_or(self.default_ttl),
                hits: 0,
            },
        );
        Ok(())
    }

    /// Cached value, if present and unexpired. An expired entry is removed
    /// and counts as a miss.
    pub fn get(&self, key: &str) -> Result<Option<T>> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let now = Instant::now();

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.hits += 1;
                inner.hits += 1;
                return Ok(Some(entry.data.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        inner.misses += 1;
        Ok(None)
    }

    /// Whether an unexpired entry exists. Does not touch the counters.
    pub fn has(&self, key: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(expired) = inner.entries.get(key).map(|e| e.is_expired(Instant::now())) else {
            return Ok(false);
        };
        if expired {
            inner.entries.remove(key);
        }
        Ok(!expired)
    }

    /// Remove `key`; returns whether it was present.
    pub fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.entries.remove(key).is_some())
    }

    /// Remove every entry and reset the counters.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.entries.clear();
        inner.hits = 0;
        inner.misses = 0;
        Ok(())
    }

    /// Remove every key starting with `prefix`; returns how many were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let mut inner = self.lock()?;
        let before = inner.entries.len();
        inner.entries.retain(|k, _| !k.starts_with(prefix));
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(prefix, removed, "invalidated cache entries");
        }
        Ok(removed)
    }

    /// Cached value, or compute, store and return it.
    pub fn get_or_compute(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: impl FnOnce() -> T,
    ) -> Result<T> {
        self.get_or_try_compute(key, ttl, || Ok(compute()))
    }

    /// Like [`get_or_compute`](Self::get_or_compute) for fallible computations.
    /// Errors are returned unchanged and nothing is stored.
    pub fn get_or_try_compute(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let value = compute()?;
        self.set(key, value.clone(), ttl)?;
        Ok(value)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let inner = self.lock()?;
        let requests = inner.hits + inner.misses;
        Ok(CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if requests == 0 {
                0.0
            } else {
                inner.hits as f64 / requests as f64
            },
            size: inner.entries.len(),
        })
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::thread::sleep;

    use super::*;

    fn cache(capacity: usize) -> CacheManager<String> {
        CacheManager::new(capacity, DEFAULT_TTL)
    }

    #[test]
    fn set_then_get() {
        let cache = cache(10);
        cache.set("a", "alpha".into(), None).unwrap();
        assert_eq!(cache.get("a").unwrap().as_deref(), Some("alpha"));
        assert!(cache.has("a").unwrap());
        assert_eq!(cache.get("b").unwrap(), None);

        let stats = cache.stats().unwrap();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn expired_get_is_a_miss_and_removes_entry() {
        let cache = cache(10);
        cache.set("a", "alpha".into(), Some(Duration::from_millis(20))).unwrap();
        sleep(Duration::from_millis(40));

        assert_eq!(cache.get("a").unwrap(), None);
        let stats = cache.stats().unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn get_or_compute_computes_once_within_ttl() {
        let cache = cache(10);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            "value".to_string()
        };

        assert_eq!(cache.get_or_compute("k", None, compute).unwrap(), "value");
        assert_eq!(cache.get_or_compute("k", None, compute).unwrap(), "value");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn get_or_try_compute_propagates_errors_without_storing() {
        let cache = cache(10);
        let err = cache
            .get_or_try_compute("k", None, || Err(RiskbaseError::not_found("k")))
            .unwrap_err();
        assert_eq!(err.code(), "DATA_NOT_FOUND");
        assert!(!cache.has("k").unwrap());
    }

    #[test]
    fn evicts_oldest_insertion_when_full() {
        let cache = cache(2);
        cache.set("first", "1".into(), None).unwrap();
        cache.set("second", "2".into(), None).unwrap();
        // Reading does not refresh insertion order.
        cache.get("first").unwrap();
        cache.set("third", "3".into(), None).unwrap();

        assert!(!cache.has("first").unwrap());
        assert!(cache.has("second").unwrap());
        assert!(cache.has("third").unwrap());
    }

    #[test]
    fn purges_expired_entries_before_evicting() {
        let cache = cache(2);
        cache.set("old", "1".into(), None).unwrap();
        cache.set("short", "2".into(), Some(Duration::from_millis(10))).unwrap();
        sleep(Duration::from_millis(30));
        cache.set("new", "3".into(), None).unwrap();

        assert!(cache.has("old").unwrap());
        assert!(cache.has("new").unwrap());
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[test]
    fn replacing_a_key_at_capacity_does_not_evict() {
        let cache = cache(2);
        cache.set("a", "1".into(), None).unwrap();
        cache.set("b", "2".into(), None).unwrap();
        cache.set("a", "updated".into(), None).unwrap();
        assert_eq!(cache.len().unwrap(), 2);
        assert_eq!(cache.get("a").unwrap().as_deref(), Some("updated"));
    }

    #[test]
    fn invalidate_prefix_and_clear() {
        let cache = cache(10);
        cache.set("risk:1", "a".into(), None).unwrap();
        cache.set("risk:2", "b".into(), None).unwrap();
        cache.set("search:x", "c".into(), None).unwrap();
        cache.get("risk:1").unwrap();

        assert_eq!(cache.invalidate_prefix("risk:").unwrap(), 2);
        assert_eq!(cache.len().unwrap(), 1);
        assert!(cache.delete("search:x").unwrap());
        assert!(!cache.delete("search:x").unwrap());

        cache.clear().unwrap();
        let stats = cache.stats().unwrap();
        assert_eq!((stats.hits, stats.misses, stats.hit_rate), (0, 0, 0.0));
    }
}

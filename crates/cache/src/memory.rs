//! In-process [`ResultCache`] backed by a mutex-guarded hash map.
//!
//! Expired entries are dropped lazily when read and in bulk by
//! [`ResultCache::purge_expired`], which the server calls on an interval.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::ResultCache;

/// Longest lifetime an entry can get. Longer TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn new(value: Value, now: Instant, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: now + ttl.min(MAX_TTL),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl MemoryCache {
    /// Create an empty cache driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            stats: CacheStats::default(),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache for MemoryCache {
    fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = Entry::new(value, self.clock.now(), ttl);
        self.entries().insert(key.to_string(), entry);
        self.stats.record_write();
    }

    fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries();
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return false;
        }
        entries.insert(key.to_string(), Entry::new(value, now, ttl));
        self.stats.record_write();
        true
    }

    fn remove(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries().remove(key).is_some_and(|e| e.is_live(now))
    }

    fn remove_if(&self, key: &str, expected: &Value) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) && entry.value == *expected => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        let purged = before - entries.len();
        drop(entries);

        if purged > 0 {
            self.stats.record_expirations(purged);
            tracing::debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    fn len(&self) -> usize {
        self.entries().len()
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

//! Shared time-to-live key-value store for run progress.
//!
//! The cache is the only channel through which a worker communicates with
//! the rest of the system. Absence of a key means "no information yet":
//! an expired entry is indistinguishable from one that was never written.

pub mod clock;
pub mod memory;
pub mod stats;

use std::time::Duration;

use serde_json::Value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryCache;
pub use stats::CacheStatsSnapshot;

/// Per-key atomic operations over JSON values with expiry.
///
/// Writes are visible to every reader as soon as the call returns.
pub trait ResultCache: Send + Sync {
    /// Store `value` under `key`, replacing any previous entry. The entry
    /// expires `ttl` after this write.
    fn set(&self, key: &str, value: Value, ttl: Duration);

    /// Read a live entry.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` only if no live entry exists. Returns whether it was stored.
    fn set_if_absent(&self, key: &str, value: Value, ttl: Duration) -> bool;

    /// Delete an entry. Returns whether a live entry was removed.
    fn remove(&self, key: &str) -> bool;

    /// Delete the entry only if it is live and equal to `expected`, in one
    /// step. Returns whether it was removed.
    fn remove_if(&self, key: &str, expected: &Value) -> bool;

    /// Drop every expired entry, returning how many were dropped.
    fn purge_expired(&self) -> usize;

    /// Number of stored entries, including expired ones not yet purged.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStatsSnapshot;
}

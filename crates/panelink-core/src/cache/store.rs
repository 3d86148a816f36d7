// ── TTL cache store ──
//
// Concurrent key -> value map with per-entry expiry and hit/miss counters.
// Expired entries are dropped lazily on lookup and in bulk every
// `SWEEP_EVERY` insertions, so keys that are written but never read again
// cannot pile up.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Every this many `set` calls, a full sweep of expired entries runs.
pub const SWEEP_EVERY: u64 = 50;

/// A cached value and the instant it stops being fresh.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// Point-in-time counters. `hits` and `misses` only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// A TTL cache owned by whoever constructs it.
///
/// Every operation is total: nothing here fails or performs I/O. Share it
/// behind an `Arc` when several tasks need the same cache.
pub struct TtlCache<V: Clone> {
    entries: DashMap<String, CacheEntry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
        }
    }

    /// Look up a fresh value. Expired entries count as a miss and are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if entry.is_fresh(now) {
                let value = entry.value.clone();
                drop(entry);
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key, "cache hit");
                return Some(value);
            }
        }

        self.entries.remove_if(key, |_, entry| !entry.is_fresh(now));
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(key, "cache miss");
        None
    }

    /// Insert or overwrite `key`, fresh for `ttl` from now.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(key.into(), CacheEntry { value, expires_at });

        let inserted = self.inserts.fetch_add(1, Ordering::Relaxed) + 1;
        if inserted % SWEEP_EVERY == 0 {
            self.sweep();
        }
    }

    /// Remove a single key.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Drop every entry whose key contains `pattern`, or everything when
    /// `pattern` is `None`. Returns how many entries were removed.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        let before = self.entries.len();
        match pattern {
            Some(p) => self.entries.retain(|key, _| !key.contains(p)),
            None => self.entries.clear(),
        }
        let removed = before.saturating_sub(self.entries.len());
        debug!(pattern = pattern.unwrap_or("*"), removed, "cache invalidated");
        removed
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read-only snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

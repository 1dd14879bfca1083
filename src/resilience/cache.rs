//! Response cache keyed by request signature.
//!
//! Entries expire after their TTL and are evicted least-recently-used when
//! the cache is full. Only successful responses are stored.

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use crate::types::RequestSignature;

/// Longest lifetime an entry can be given.
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that found nothing fresh.
    pub misses: u64,
    /// Entries currently stored (including expired ones not yet evicted).
    pub entries: usize,
    /// Maximum entries.
    pub capacity: usize,
}

/// Bounded TTL cache of successful responses.
pub struct ResponseCache {
    entries: Mutex<LruCache<RequestSignature, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Creates a cache holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the stored value if present and not expired.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&self, signature: &RequestSignature) -> Option<Value> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let lookup = entries
            .get(signature)
            .map(|entry| (now < entry.expires_at).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(signature = %signature, "Cache hit");
                Some(value)
            }
            Some(None) => {
                entries.pop(signature);
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(signature = %signature, "Cache entry expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(signature = %signature, "Cache miss");
                None
            }
        }
    }

    /// Stores a value. A zero TTL stores nothing.
    pub fn put(&self, signature: RequestSignature, value: Value, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }

        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + ttl.min(MAX_TTL),
        };
        self.entries.lock().put(signature, entry);
    }

    /// Removes one entry.
    pub fn invalidate(&self, signature: &RequestSignature) -> bool {
        self.entries.lock().pop(signature).is_some()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns hit/miss counters and occupancy.
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("stats", &self.stats())
            .finish()
    }
}

//! TTL-bounded result cache.
//!
//! Caches serialized recommendation lists keyed by request fingerprint. The
//! contract is deliberately narrow (get/put, TTL decided by the cache) so
//! any TTL-capable key-value product can back it; the in-memory
//! implementation is the reference.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

/// Default time-to-live for cached results.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default bound on resident entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Cache contract for serialized recommendation results.
///
/// Values are opaque serialized payloads; the engine owns the schema. A
/// `get` miss and an expired entry are indistinguishable to the caller.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Fetch the cached payload for `key`, if present and not expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, subject to the cache's TTL.
    async fn put(&self, key: &str, value: String);
}

/// A cached payload with its creation timestamp.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: Instant,
}

impl CacheEntry {
    fn new(value: String) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// In-memory [`ResultCache`] with lazy TTL expiry and a capacity bound.
///
/// Expired entries are dropped when read; when a `put` would exceed the
/// capacity bound, expired entries are purged first and the oldest entries
/// evicted after that.
pub struct InMemoryResultCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryResultCache {
    /// Create a cache with the default TTL (1 hour) and capacity.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }

    /// Create a cache with an explicit TTL and capacity bound.
    pub fn with_ttl(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of resident entries, including not-yet-purged expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn evict_for_insert(entries: &mut HashMap<String, CacheEntry>, ttl: Duration, max: usize) {
        if entries.len() < max {
            return;
        }
        entries.retain(|_, e| !e.is_expired(ttl));
        while entries.len() >= max {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for InMemoryResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if !entry.is_expired(self.ttl) => {
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop it under the write lock.
        let mut entries = self.entries.write();
        if entries.get(key).is_some_and(|e| e.is_expired(self.ttl)) {
            entries.remove(key);
            debug!(key, "evicted expired cache entry");
        }
        None
    }

    async fn put(&self, key: &str, value: String) {
        let mut entries = self.entries.write();
        Self::evict_for_insert(&mut entries, self.ttl, self.max_entries);
        entries.insert(key.to_owned(), CacheEntry::new(value));
    }
}

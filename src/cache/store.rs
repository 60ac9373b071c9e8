//! Response storage with time-bound entries.

use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use metrics::{counter, gauge};
use tokio::time::Instant;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::CacheLock;
use super::{
    METRIC_ENTRIES, METRIC_EVICT_TOTAL, METRIC_EXPIRED_TOTAL, METRIC_HIT_TOTAL, METRIC_MISS_TOTAL,
};

const OWNER: &str = "response_store";

/// Cached HTTP response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct StoredEntry {
    response: CachedResponse,
    stored_at: Instant,
}

/// LRU response store whose entries expire `ttl` after they were written.
///
/// Expiry is lazy: an entry past its TTL is dropped by the `get` that finds
/// it. The clock is tokio's, so tests can advance it with a paused runtime.
pub struct ResponseStore {
    entries: CacheLock<LruCache<CacheKey, StoredEntry>>,
    ttl: Duration,
}

impl ResponseStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: CacheLock::new(OWNER, LruCache::new(config.max_entries)),
            ttl: config.index_ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let mut entries = self.entries.write("get");

        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                counter!(METRIC_HIT_TOTAL).increment(1);
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(key);
            counter!(METRIC_EXPIRED_TOTAL).increment(1);
            gauge!(METRIC_ENTRIES).set(entries.len() as f64);
        }
        counter!(METRIC_MISS_TOTAL).increment(1);
        None
    }

    /// Store a response, restarting its TTL. Returns the key evicted to make
    /// room, if any.
    pub fn set(&self, key: CacheKey, response: CachedResponse) -> Option<CacheKey> {
        let mut entries = self.entries.write("set");
        let evicted = entries
            .push(
                key.clone(),
                StoredEntry {
                    response,
                    stored_at: Instant::now(),
                },
            )
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != key);

        if evicted.is_some() {
            counter!(METRIC_EVICT_TOTAL).increment(1);
        }
        gauge!(METRIC_ENTRIES).set(entries.len() as f64);
        evicted
    }

    /// Drop every entry immediately.
    pub fn clear(&self) {
        self.entries.write("clear").clear();
        gauge!(METRIC_ENTRIES).set(0.0);
    }

    pub fn len(&self) -> usize {
        self.entries.read("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

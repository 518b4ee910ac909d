//! TTL cache manager for weather API responses
//!
//! Provides a `CacheManager` that stores raw API payloads in a durable
//! key-value store with a write timestamp, answering "do we have a fresh
//! enough answer already?". Storage faults never reach the caller: corrupt
//! entries are treated as misses and deleted, and a quota-exceeded write
//! triggers one eviction sweep and one retry before being dropped.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::store::{KeyValueStore, StoreError};
use crate::clock::Clock;

/// How long a cached entry is considered fresh
pub const CACHE_TTL_MS: i64 = 60_000;

/// Namespace prefix for entries in the backing store
const CACHE_PREFIX: &str = "weather_cache_";

/// Wire format of a stored entry
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    /// The raw upstream payload
    payload: Value,
    /// When the entry was written
    written_at: DateTime<Utc>,
}

/// Result of reading from the cache
#[derive(Debug, Clone)]
pub struct CacheHit {
    /// The cached payload
    pub payload: Value,
    /// Age of the entry in whole seconds
    pub age_seconds: u64,
    /// Whether the entry is past its TTL
    pub stale: bool,
}

/// Counts returned by [`CacheManager::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in the store
    pub total: usize,
    /// Entries younger than the TTL
    pub fresh: usize,
    /// Entries past the TTL (still usable for fallback display)
    pub stale: usize,
}

/// Manages reading and writing cached payloads with a freshness TTL
///
/// An entry is fresh while `now - written_at < TTL`. Staleness alone never
/// deletes an entry; stale entries remain readable through [`get_any`] and
/// [`age_seconds`] until an explicit eviction (invalidate, sweep, or quota
/// recovery) removes them.
///
/// [`get_any`]: CacheManager::get_any
/// [`age_seconds`]: CacheManager::age_seconds
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl CacheManager {
    /// Creates a cache manager over the given store and clock with the
    /// default 60 second TTL
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::milliseconds(CACHE_TTL_MS),
        }
    }

    /// Overrides the TTL, mainly for tests
    pub fn with_ttl_millis(mut self, ttl_ms: i64) -> Self {
        self.ttl = Duration::milliseconds(ttl_ms);
        self
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    /// Reads and parses an entry, deleting it if it cannot be parsed
    fn load(&self, key: &str) -> Option<StoredEntry> {
        let raw = self.store.read(&Self::storage_key(key))?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                // Fail closed: a corrupt entry is a miss, and it goes away
                warn!("cache entry for {} is corrupt ({}), deleting", key, e);
                self.store.remove(&Self::storage_key(key));
                None
            }
        }
    }

    fn age_of(&self, entry: &StoredEntry) -> Duration {
        let age = self.clock.now() - entry.written_at;
        age.max(Duration::zero())
    }

    /// Returns the entry for `key` only if it is still fresh
    ///
    /// A stale or corrupt entry reports `None`; neither case errors.
    pub fn get(&self, key: &str) -> Option<CacheHit> {
        let entry = self.load(key)?;
        let age = self.age_of(&entry);
        if age < self.ttl {
            let age_seconds = age.num_seconds() as u64;
            debug!("cache HIT for {} ({}s old)", key, age_seconds);
            Some(CacheHit {
                payload: entry.payload,
                age_seconds,
                stale: false,
            })
        } else {
            debug!("cache EXPIRED for {}", key);
            None
        }
    }

    /// Returns the entry for `key` whether fresh or stale
    ///
    /// Used for "last known value" fallback display; `stale` tells the
    /// caller which case it got.
    pub fn get_any(&self, key: &str) -> Option<CacheHit> {
        let entry = self.load(key)?;
        let age = self.age_of(&entry);
        Some(CacheHit {
            payload: entry.payload,
            age_seconds: age.num_seconds() as u64,
            stale: age >= self.ttl,
        })
    }

    /// Writes `payload` under `key`, stamping the current time
    ///
    /// Best effort: on a quota failure the manager sweeps expired entries
    /// and retries exactly once; if the retry also fails the write is
    /// dropped and the caller's fetch still counts as successful.
    pub fn put(&self, key: &str, payload: &Value) {
        let entry = StoredEntry {
            payload: payload.clone(),
            written_at: self.clock.now(),
        };
        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize cache entry for {}: {}", key, e);
                return;
            }
        };

        match self.store.write(&Self::storage_key(key), &json) {
            Ok(()) => debug!("cache SAVED for {}", key),
            Err(StoreError::QuotaExceeded) => {
                let swept = self.sweep_expired();
                debug!("cache quota hit, swept {} expired entries", swept);
                if let Err(e) = self.store.write(&Self::storage_key(key), &json) {
                    warn!("dropping cache write for {} after sweep: {}", key, e);
                }
            }
            Err(e) => warn!("dropping cache write for {}: {}", key, e),
        }
    }

    /// Removes the entry for `key`
    pub fn invalidate(&self, key: &str) {
        self.store.remove(&Self::storage_key(key));
        debug!("cache CLEARED for {}", key);
    }

    /// Removes every entry in the cache namespace
    pub fn invalidate_all(&self) {
        let keys = self.keys();
        for key in &keys {
            self.store.remove(&Self::storage_key(key));
        }
        debug!("cleared {} cache entries", keys.len());
    }

    /// Removes entries past the TTL (and any unparseable ones)
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let mut removed = 0;
        for key in self.keys() {
            let storage_key = Self::storage_key(&key);
            let Some(raw) = self.store.read(&storage_key) else {
                continue;
            };
            let expired = match serde_json::from_str::<StoredEntry>(&raw) {
                Ok(entry) => self.age_of(&entry) >= self.ttl,
                // Invalid entry, remove it
                Err(_) => true,
            };
            if expired {
                self.store.remove(&storage_key);
                removed += 1;
            }
        }
        removed
    }

    /// Age in whole seconds of the entry for `key`, fresh or not
    pub fn age_seconds(&self, key: &str) -> Option<u64> {
        let entry = self.load(key)?;
        Some(self.age_of(&entry).num_seconds() as u64)
    }

    /// All cache keys currently present (fingerprints, prefix stripped)
    pub fn keys(&self) -> Vec<String> {
        self.store
            .keys()
            .into_iter()
            .filter_map(|k| k.strip_prefix(CACHE_PREFIX).map(str::to_string))
            .collect()
    }

    /// Counts of total, fresh and stale entries
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            total: 0,
            fresh: 0,
            stale: 0,
        };
        for key in self.keys() {
            let Some(entry) = self.load(&key) else {
                continue;
            };
            stats.total += 1;
            if self.age_of(&entry) < self.ttl {
                stats.fresh += 1;
            } else {
                stats.stale += 1;
            }
        }
        stats
    }
}

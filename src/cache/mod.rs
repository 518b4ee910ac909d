//! Time-bounded durable cache for API responses
//!
//! This module provides a TTL cache manager over a pluggable key-value
//! store. Entries past their TTL stop being served as data but remain
//! available (with their age) for fallback display until explicitly
//! evicted, allowing graceful degradation when the API is unavailable.

mod manager;
pub mod store;

pub use manager::{CacheHit, CacheManager, CacheStats, CACHE_TTL_MS};
pub use store::{DiskStore, KeyValueStore, MemoryStore, StoreError};

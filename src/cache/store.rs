//! Durable key-value storage backing the cache
//!
//! The cache manager only needs a string store with a quota failure mode:
//! read, write, remove and key enumeration. `DiskStore` persists one file
//! per key in an XDG-compliant cache directory so entries survive process
//! restarts; `MemoryStore` is capacity-bounded and used in tests to
//! simulate quota exhaustion deterministically.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use directories::ProjectDirs;
use thiserror::Error;

/// Errors from the storage backend
///
/// `QuotaExceeded` is the only variant the cache manager reacts to; any
/// other failure is treated the same as a dropped write.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend is out of space; an eviction sweep may free room
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// Any other I/O failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// String key-value store with durable semantics
///
/// Reads fail soft: a missing or unreadable entry is `None`. Writes report
/// quota exhaustion distinctly so the caller can evict and retry.
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored string for `key`, or `None` if absent/unreadable
    fn read(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, overwriting any previous value
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes the entry for `key` if present
    fn remove(&self, key: &str);

    /// Returns all keys currently present in the store
    fn keys(&self) -> Vec<String>;
}

/// Disk-backed store writing one file per key
///
/// Files live in `~/.cache/skycast/` on Linux (or the platform equivalent)
/// and are named `<key>.json`. Keys are produced by fingerprint computation
/// and contain only filesystem-safe characters.
#[derive(Debug, Clone)]
pub struct DiskStore {
    /// Directory where entries are stored
    dir: PathBuf,
}

impl DiskStore {
    /// Creates a store in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined
    /// (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "skycast")?;
        Some(Self {
            dir: project_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Creates a store rooted at a custom directory
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }
}

impl KeyValueStore for DiskStore {
    fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.entry_path(key)).ok()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.ensure_dir()?;
        fs::write(self.entry_path(key), value).map_err(|e| {
            // ENOSPC / EDQUOT are the disk equivalents of a storage quota
            if e.kind() == std::io::ErrorKind::StorageFull || e.raw_os_error() == Some(122) {
                StoreError::QuotaExceeded
            } else {
                StoreError::Io(e)
            }
        })
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.entry_path(key));
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| {
                let name = entry.ok()?.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect()
    }
}

/// In-memory store with an optional entry-count quota
///
/// Overwriting an existing key never counts against the quota, matching
/// how a full backend still accepts same-slot replacement.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    max_entries: Option<usize>,
}

impl MemoryStore {
    /// Creates an unbounded in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that refuses new keys beyond `max_entries`
    pub fn with_capacity_limit(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: Some(max_entries),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(max) = self.max_entries {
            if entries.len() >= max && !entries.contains_key(key) {
                return Err(StoreError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

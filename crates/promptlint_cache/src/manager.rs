//! File-backed cache store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use promptlint_result::LintResult;
use tracing::{debug, info};

use crate::entry::now_secs;
use crate::{CacheEntry, CacheError, CacheKey, CacheStore};

const CACHE_FILE: &str = "cache.rkyv";

/// Manages the persistent lint cache.
///
/// Entries live in memory for the duration of a run and are written to
/// `<cache_dir>/cache.rkyv` on [`flush`](CacheStore::flush). The file is
/// replaced atomically, so an interrupted run leaves either the previous or
/// the new cache on disk, never a partial one.
///
/// Keys change whenever a file, rule or model changes, so superseded entries
/// are never looked up again. With a [`max_age`](CacheManager::with_max_age)
/// they are dropped on load and on flush instead of being carried forever.
pub struct CacheManager {
    /// Directory where cache files are stored.
    cache_dir: PathBuf,
    /// In-memory cache entries, keyed by hex cache key.
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Set when entries changed since the last flush.
    dirty: AtomicBool,
    /// Whether cache is enabled.
    enabled: bool,
    /// Entries older than this are pruned. `None` keeps everything.
    max_age: Option<Duration>,
}

impl CacheManager {
    /// Creates a new cache manager.
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - Directory to store cache files
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            entries: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            enabled: true,
            max_age: None,
        }
    }

    /// Expires entries older than `max_age`.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Disables caching. Every lookup misses and nothing is written.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Enables caching.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Returns whether caching is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the directory holding the cache file.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Removes a cache entry.
    pub fn remove(&self, key: &CacheKey) {
        if self.entries.write().remove(key.as_str()).is_some() {
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// Clears all cache entries.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.dirty.store(true, Ordering::Release);
    }

    /// Drops expired entries and returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let Some(max_age) = self.max_age else {
            return 0;
        };
        let now = now_secs();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, max_age));
        let removed = before - entries.len();
        if removed > 0 {
            self.dirty.store(true, Ordering::Release);
            debug!("Pruned {} expired cache entries", removed);
        }
        removed
    }

    /// Loads cache from disk, replacing the in-memory entries.
    pub fn load(&self) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }

        let cache_file = self.cache_dir.join(CACHE_FILE);

        if !cache_file.exists() {
            debug!("No cache file found at {}", cache_file.display());
            return Ok(());
        }

        let content = fs::read(&cache_file)?;
        let entries: HashMap<String, CacheEntry> =
            rkyv::from_bytes::<_, rkyv::rancor::Error>(&content)
                .map_err(|e| CacheError::corrupted(e.to_string()))?;

        info!("Loaded {} cache entries", entries.len());
        *self.entries.write() = entries;
        self.dirty.store(false, Ordering::Release);
        self.prune_expired();

        Ok(())
    }

    /// Returns the number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CacheStore for CacheManager {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(self
            .entries
            .read()
            .get(key.as_str())
            .filter(|entry| entry.matches(key))
            .cloned())
    }

    fn set(&self, key: &CacheKey, result: &LintResult) -> Result<(), CacheError> {
        if self.enabled {
            let entry = CacheEntry::new(key, result.clone());
            self.entries.write().insert(key.as_str().to_string(), entry);
            self.dirty.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), CacheError> {
        if !self.enabled {
            return Ok(());
        }
        self.prune_expired();
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let write = || -> Result<usize, CacheError> {
            fs::create_dir_all(&self.cache_dir)?;

            let entries = self.entries.read();
            let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&*entries)
                .map_err(|e| CacheError::Serialization(e.to_string()))?;

            let cache_file = self.cache_dir.join(CACHE_FILE);
            let tmp_file = self.cache_dir.join(format!("{CACHE_FILE}.tmp"));
            fs::write(&tmp_file, bytes)?;
            fs::rename(&tmp_file, &cache_file)?;
            Ok(entries.len())
        };

        match write() {
            Ok(count) => {
                info!(
                    "Saved {} cache entries to {}",
                    count,
                    self.cache_dir.join(CACHE_FILE).display()
                );
                Ok(())
            }
            Err(e) => {
                // Keep the entries pending so a later flush can retry.
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(".promptlint-cache")
    }
}

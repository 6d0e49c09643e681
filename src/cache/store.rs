//! File-backed TTL cache for API responses
//!
//! Provides a `Cache` that stores serializable data to JSON files keyed by a
//! SHA-256 hash of the logical key, with per-instance TTL. Storage failures
//! degrade to cache misses; the cache is a cost optimization, never a
//! correctness dependency.

use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when writing to the cache
///
/// Read-side failures are never surfaced as errors; they are logged and
/// treated as cache misses so callers can always fall back to a fresh fetch.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache directory could not be created or a file operation failed
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The value could not be serialized to JSON
    #[error("failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Wrapper struct for cached data stored on disk
///
/// The original key is stored alongside the payload for debuggability, since
/// the filename is a hash and can't be reversed into its logical key.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The logical key this entry was written under
    key: String,
    /// When the data was cached, in milliseconds since the epoch
    timestamp: i64,
    /// TTL the entry was written with, in milliseconds
    ttl: u64,
    /// The cached data
    data: T,
}

/// Read-only cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Number of entry files on disk
    pub total_entries: usize,
    /// Entries still within their stored TTL
    pub valid_entries: usize,
    /// Entries past their stored TTL (or unparseable)
    pub expired_entries: usize,
    /// Combined size of all entry files in bytes
    pub total_size: u64,
    /// Combined size in megabytes
    pub total_size_mb: f64,
}

/// File-backed cache with a fixed time-to-live
///
/// Each entry is a JSON file named by the SHA-256 hash of its logical key, so
/// arbitrary strings (URLs, prompts, anything with filename-illegal
/// characters) are safe to use as keys. The TTL is fixed per cache instance;
/// callers wanting different lifetimes construct separate instances, which
/// may safely share a directory since filenames depend only on the key.
#[derive(Debug, Clone)]
pub struct Cache {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// How long entries written by this instance stay fresh
    ttl: Duration,
}

impl Cache {
    /// Creates a cache in the XDG-compliant cache directory with the given TTL
    ///
    /// Uses `~/.cache/seoscout/` on Linux, or the equivalent path on other
    /// platforms. Returns `None` if no cache directory can be determined
    /// (e.g., no home directory).
    pub fn new(ttl: Duration) -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "seoscout")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir, ttl })
    }

    /// Creates a cache with a custom directory
    pub fn with_dir(cache_dir: PathBuf, ttl: Duration) -> Self {
        Self { cache_dir, ttl }
    }

    /// Returns the path to the entry file for the given logical key
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.cache_dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Ensures the cache directory exists
    fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    fn ttl_millis(&self) -> u64 {
        self.ttl.as_millis() as u64
    }

    /// Reads a value from the cache
    ///
    /// Returns `None` if no entry exists, the entry has expired, or the entry
    /// cannot be read or parsed. An expired entry is deleted as part of this
    /// call. Corruption is logged and treated the same as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "corrupt cache entry, treating as miss");
                return None;
            }
        };

        let age = Utc::now().timestamp_millis().saturating_sub(entry.timestamp);
        if age >= 0 && (age as u64) < self.ttl_millis() {
            debug!(key, age_ms = age, "cache hit");
            return Some(entry.data);
        }

        debug!(key, age_ms = age, "cache entry expired");
        let _ = fs::remove_file(&path);
        None
    }

    /// Writes a value to the cache under the given key
    ///
    /// Creates the cache directory if needed and overwrites any existing
    /// entry for the same key.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.ensure_dir()?;

        let entry = CacheEntry {
            key: key.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            ttl: self.ttl_millis(),
            data: value,
        };

        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(self.entry_path(key), json)?;
        debug!(key, ttl_ms = self.ttl_millis(), "cached");
        Ok(())
    }

    /// Returns true if a fresh entry exists for the key
    ///
    /// Shares `get`'s expiry semantics, including lazy deletion.
    pub fn has(&self, key: &str) -> bool {
        self.get::<serde_json::Value>(key).is_some()
    }

    /// Deletes the entry for the key; a missing entry is not an error
    pub fn delete(&self, key: &str) {
        match fs::remove_file(self.entry_path(key)) {
            Ok(()) => debug!(key, "cache entry deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(key, error = %e, "cache delete failed"),
        }
    }

    /// Removes every entry in this cache's directory
    ///
    /// Returns the number of entry files removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for file in self.entry_files()? {
            fs::remove_file(&file)?;
            removed += 1;
        }
        debug!(removed, "cache cleared");
        Ok(removed)
    }

    /// Deletes entries whose age exceeds their own stored TTL
    ///
    /// Each entry is judged against the TTL it was written with, not this
    /// instance's TTL, so entries written by caches with other lifetimes are
    /// aged correctly. Unparseable files are treated as expired and removed.
    /// Returns the number of entries deleted; all errors are absorbed.
    pub fn clean_expired(&self) -> usize {
        let files = match self.entry_files() {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "cache cleanup failed");
                return 0;
            }
        };

        let now = Utc::now().timestamp_millis();
        let mut cleaned = 0;

        for file in files {
            let expired = match fs::read_to_string(&file)
                .ok()
                .and_then(|content| serde_json::from_str::<CacheEntry<serde_json::Value>>(&content).ok())
            {
                Some(entry) => now.saturating_sub(entry.timestamp) as u64 > entry.ttl,
                // Invalid file, delete it
                None => true,
            };

            if expired && fs::remove_file(&file).is_ok() {
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            debug!(cleaned, "removed expired cache entries");
        }
        cleaned
    }

    /// Returns statistics about the cache directory without mutating it
    pub fn stats(&self) -> CacheStats {
        let files = self.entry_files().unwrap_or_default();
        let now = Utc::now().timestamp_millis();

        let mut total_size = 0u64;
        let mut valid_entries = 0;
        let mut expired_entries = 0;

        for file in &files {
            if let Ok(meta) = fs::metadata(file) {
                total_size += meta.len();
            }

            let fresh = fs::read_to_string(file)
                .ok()
                .and_then(|content| serde_json::from_str::<CacheEntry<serde_json::Value>>(&content).ok())
                .is_some_and(|entry| (now.saturating_sub(entry.timestamp) as u64) < entry.ttl);

            if fresh {
                valid_entries += 1;
            } else {
                expired_entries += 1;
            }
        }

        CacheStats {
            total_entries: files.len(),
            valid_entries,
            expired_entries,
            total_size,
            total_size_mb: total_size as f64 / 1024.0 / 1024.0,
        }
    }

    /// Returns the cached value for the key, or computes and caches it
    ///
    /// On a hit the stored value is returned without invoking `f`. On a miss
    /// `f` runs, its result is written to the cache best-effort (a failed
    /// write is logged, never propagated), and the fresh value is returned.
    /// There is no locking: concurrent callers racing on the same key will
    /// each invoke `f` independently, last write wins.
    pub async fn wrap<T, F, Fut>(&self, key: &str, f: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get(key) {
            return value;
        }

        let value = f().await;
        if let Err(e) = self.set(key, &value) {
            warn!(key, error = %e, "cache write failed, returning uncached value");
        }
        value
    }

    /// Lists the JSON entry files in the cache directory
    ///
    /// A missing directory is an empty cache, not an error.
    fn entry_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::thread;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    fn sample() -> TestData {
        TestData {
            name: "test".to_string(),
            value: 42,
        }
    }

    fn create_test_cache(ttl: Duration) -> (Cache, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = Cache::with_dir(temp_dir.path().to_path_buf(), ttl);
        (cache, temp_dir)
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));
        let data = sample();

        cache.set("round-trip", &data).expect("Write should succeed");
        let result: TestData = cache.get("round-trip").expect("Should hit cache");

        assert_eq!(result, data);
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));

        let result: Option<TestData> = cache.get("never-set-key");

        assert!(result.is_none());
    }

    #[test]
    fn test_expired_entry_returns_none_and_is_deleted() {
        let (cache, temp_dir) = create_test_cache(Duration::from_millis(0));
        cache.set("expired", &sample()).expect("Write should succeed");
        thread::sleep(Duration::from_millis(10));

        let result: Option<TestData> = cache.get("expired");

        assert!(result.is_none(), "Expired entry should be a miss");
        let remaining = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(remaining, 0, "Expired entry should be lazily deleted");
    }

    #[test]
    fn test_keys_with_filename_illegal_characters() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));
        let key = "https://example.com/path?q=sydney seo/../\\<>*";

        cache.set(key, &sample()).expect("Write should succeed");
        let result: TestData = cache.get(key).expect("Should hit cache");

        assert_eq!(result, sample());
    }

    #[test]
    fn test_entry_file_records_original_key_and_ttl() {
        let (cache, temp_dir) = create_test_cache(Duration::from_secs(60));
        cache.set("my-key", &sample()).expect("Write should succeed");

        let file = fs::read_dir(temp_dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let content = fs::read_to_string(file).unwrap();
        let entry: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert_eq!(entry["key"], "my-key");
        assert_eq!(entry["ttl"], 60_000);
        assert!(entry["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_overwrite_existing_entry() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));
        let first = TestData {
            name: "first".to_string(),
            value: 1,
        };
        let second = TestData {
            name: "second".to_string(),
            value: 2,
        };

        cache.set("key", &first).expect("First write should succeed");
        cache.set("key", &second).expect("Second write should succeed");

        let result: TestData = cache.get("key").expect("Should hit cache");
        assert_eq!(result, second);
    }

    #[test]
    fn test_set_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested = temp_dir.path().join("nested").join("cache");
        let cache = Cache::with_dir(nested.clone(), Duration::from_secs(60));

        cache.set("key", &sample()).expect("Write should succeed");

        assert!(nested.exists(), "Nested directory should be created");
    }

    #[test]
    fn test_has_follows_get_semantics() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));
        assert!(!cache.has("key"));

        cache.set("key", &sample()).expect("Write should succeed");
        assert!(cache.has("key"));
    }

    #[test]
    fn test_delete_removes_entry_and_missing_is_noop() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));
        cache.set("key", &sample()).expect("Write should succeed");

        cache.delete("key");
        assert!(!cache.has("key"));

        // Deleting again must not panic or error
        cache.delete("key");
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));
        cache.set("a", &sample()).unwrap();
        cache.set("b", &sample()).unwrap();
        cache.set("c", &sample()).unwrap();

        let removed = cache.clear().expect("Clear should succeed");

        assert_eq!(removed, 3);
        assert!(!cache.has("a"));
        assert!(!cache.has("b"));
        assert!(!cache.has("c"));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let (cache, temp_dir) = create_test_cache(Duration::from_secs(60));
        cache.set("key", &sample()).unwrap();

        // Corrupt the entry file on disk
        let file = fs::read_dir(temp_dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        fs::write(&file, "{ not valid json").unwrap();

        let result: Option<TestData> = cache.get("key");
        assert!(result.is_none(), "Corrupt entry should read as a miss");
    }

    #[test]
    fn test_clean_expired_honors_stored_ttl() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().to_path_buf();

        // One entry written with a zero TTL, one with a long TTL, sharing the
        // same directory. Cleanup must judge each by the TTL it was written
        // with, regardless of which instance performs it.
        let short = Cache::with_dir(dir.clone(), Duration::from_millis(0));
        let long = Cache::with_dir(dir.clone(), Duration::from_secs(3600));
        short.set("stale", &sample()).unwrap();
        long.set("fresh", &sample()).unwrap();
        thread::sleep(Duration::from_millis(10));

        let cleaned = long.clean_expired();

        assert_eq!(cleaned, 1);
        let fresh: Option<TestData> = long.get("fresh");
        assert!(fresh.is_some(), "Fresh entry should survive cleanup");
    }

    #[test]
    fn test_clean_expired_removes_corrupt_files() {
        let (cache, temp_dir) = create_test_cache(Duration::from_secs(60));
        fs::write(temp_dir.path().join("garbage.json"), "not json").unwrap();

        let cleaned = cache.clean_expired();

        assert_eq!(cleaned, 1);
    }

    #[test]
    fn test_stats_counts_valid_and_expired_entries() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().to_path_buf();
        let short = Cache::with_dir(dir.clone(), Duration::from_millis(0));
        let long = Cache::with_dir(dir.clone(), Duration::from_secs(3600));

        short.set("stale", &sample()).unwrap();
        long.set("fresh", &sample()).unwrap();
        thread::sleep(Duration::from_millis(10));

        let stats = long.stats();

        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 1);
        assert!(stats.total_size > 0);
        assert!(stats.total_size_mb > 0.0);
    }

    #[test]
    fn test_stats_on_empty_cache() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));

        let stats = cache.stats();

        assert_eq!(
            stats,
            CacheStats {
                total_entries: 0,
                valid_entries: 0,
                expired_entries: 0,
                total_size: 0,
                total_size_mb: 0.0,
            }
        );
    }

    #[tokio::test]
    async fn test_wrap_invokes_fn_once_within_ttl() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_secs(60));
        let calls = Cell::new(0);

        let first: TestData = cache
            .wrap("wrapped", || async {
                calls.set(calls.get() + 1);
                sample()
            })
            .await;
        let second: TestData = cache
            .wrap("wrapped", || async {
                calls.set(calls.get() + 1);
                sample()
            })
            .await;

        assert_eq!(calls.get(), 1, "Second call should be served from cache");
        assert_eq!(first, sample());
        assert_eq!(second, sample());
    }

    #[tokio::test]
    async fn test_wrap_recomputes_after_expiry() {
        let (cache, _temp_dir) = create_test_cache(Duration::from_millis(0));
        let calls = Cell::new(0);

        for _ in 0..2 {
            let _: TestData = cache
                .wrap("wrapped", || async {
                    calls.set(calls.get() + 1);
                    sample()
                })
                .await;
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(calls.get(), 2, "Expired entry should trigger recompute");
    }

    #[test]
    fn test_new_uses_project_cache_path() {
        if let Some(cache) = Cache::new(Duration::from_secs(60)) {
            let path_str = cache.cache_dir.to_string_lossy();
            assert!(
                path_str.contains("seoscout"),
                "Cache path should contain project name"
            );
        }
        // Test passes if new() returns None (e.g., no home directory in CI)
    }
}

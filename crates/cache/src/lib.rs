//! Persistent hash-keyed cache: a single JSON file mapping `key` to
//! `{hash, data}`, written atomically and tolerant of corruption.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use harvester_core::{CacheEntry, HarvestError};
use md5::{Digest, Md5};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

/// A file-backed cache of `CacheEntry<T>` values keyed by string. The whole
/// map is held in memory and rewritten in full on every `set`/`invalidate` —
/// fine for the thousand-ish entries a product catalog produces, and it
/// keeps the persistence format identical to the single JSON object the
/// original tool read and wrote.
pub struct FileCache<T> {
    path: PathBuf,
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T> FileCache<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Load the cache from `path`, or start empty if the file doesn't exist.
    /// A file that exists but fails to parse is copied aside with a
    /// `.corrupt` suffix and treated as if it were absent; this is reported
    /// through the logger, not surfaced as an error to the caller.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(map) => map,
                Err(e) => {
                    let corrupt_path = corrupt_sibling(&path);
                    if let Err(copy_err) = fs::copy(&path, &corrupt_path) {
                        warn!(path = %path.display(), error = %copy_err, "failed to back up corrupt cache file");
                    }
                    warn!(
                        path = %path.display(),
                        backup = %corrupt_path.display(),
                        error = %e,
                        "cache file corrupted, starting with an empty cache"
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self { path, entries }
    }

    /// MD5 hex digest of the UTF-8 bytes of `content`. Used only for change
    /// detection, never for anything security-sensitive.
    pub fn hash_content(content: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Return the cached payload for `key`, if present and (when
    /// `expected_hash` is given) the stored hash matches.
    pub fn get(&self, key: &str, expected_hash: Option<&str>) -> Option<T> {
        let entry = self.entries.get(key)?;
        match expected_hash {
            Some(h) if entry.hash != h => None,
            _ => Some(entry.data.clone()),
        }
    }

    pub fn exists(&self, key: &str, expected_hash: Option<&str>) -> bool {
        self.get(key, expected_hash).is_some()
    }

    /// Store `data` under `key` with its content hash and persist the whole
    /// map to disk. Empty keys are rejected with a warning; nothing is
    /// stored or written.
    pub fn set(&mut self, key: &str, data: T, hash: String) -> Result<(), HarvestError> {
        if key.is_empty() {
            warn!("tried to cache an item with an empty key");
            return Ok(());
        }
        self.entries.insert(key.to_string(), CacheEntry { hash, data });
        info!(key, "updating cache entry");
        self.persist()
    }

    pub fn invalidate(&mut self, key: &str) -> Result<(), HarvestError> {
        if self.entries.remove(key).is_some() {
            info!(key, "invalidated cache entry");
            self.persist()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write to a sibling temporary file, then rename over the target.
    /// Readers never observe a partially written file.
    fn persist(&self) -> Result<(), HarvestError> {
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| HarvestError::Cache(e.to_string()))?;
        serde_json::to_writer_pretty(&mut tmp, &self.entries).map_err(|e| HarvestError::Cache(e.to_string()))?;
        tmp.persist(&self.path).map_err(|e| HarvestError::Cache(e.error.to_string()))?;
        Ok(())
    }
}

fn corrupt_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        body: String,
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache: FileCache<Payload> = FileCache::load(&path);
        assert!(cache.is_empty());

        let hash = FileCache::<Payload>::hash_content("hello");
        cache.set("k1", Payload { body: "hello".into() }, hash.clone()).unwrap();

        let reloaded: FileCache<Payload> = FileCache::load(&path);
        assert_eq!(reloaded.get("k1", None), Some(Payload { body: "hello".into() }));
        assert_eq!(reloaded.get("k1", Some(&hash)), Some(Payload { body: "hello".into() }));
        assert_eq!(reloaded.get("k1", Some("deadbeef")), None);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let cache: FileCache<Payload> = FileCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupted_file_is_backed_up_and_replaced_by_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{not valid json").unwrap();

        let cache: FileCache<Payload> = FileCache::load(&path);
        assert!(cache.is_empty());
        assert!(dir.path().join("cache.json.corrupt").exists());
    }

    #[test]
    fn empty_key_is_rejected_without_storing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache: FileCache<Payload> = FileCache::load(&path);
        cache.set("", Payload { body: "x".into() }, "abc".into()).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache: FileCache<Payload> = FileCache::load(&path);
        cache.set("k1", Payload { body: "x".into() }, "abc".into()).unwrap();
        cache.invalidate("k1").unwrap();
        assert!(cache.get("k1", None).is_none());
    }

    #[test]
    fn hash_content_is_stable_md5() {
        assert_eq!(FileCache::<Payload>::hash_content("hello"), "5d41402abc4b2a76b9719d911017c592");
    }
}

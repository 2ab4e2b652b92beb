//! Backing stores for [`Cache`](super::Cache).
//!
//! A store is a plain synchronous key/slot map. Expiration bookkeeping lives in
//! the cache itself; stores never interpret slots.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// A single stored value: either payload bytes or an expiration instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Data(Vec<u8>),
    Expiry(DateTime<Utc>),
}

pub trait Store: Send + Sync + Debug {
    /// A short name for logs, e.g. "memory" or "file".
    fn name(&self) -> &'static str;

    fn load(&self, key: &str) -> Option<Slot>;

    fn save(&self, key: &str, slot: Slot);

    fn remove(&self, key: &str);
}

/// Volatile store, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self, key: &str) -> Option<Slot> {
        self.entries.read().get(key).cloned()
    }

    fn save(&self, key: &str, slot: Slot) {
        self.entries.write().insert(key.to_string(), slot);
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

/// Durable store backed by a JSON document on disk.
///
/// The whole document is loaded on open and rewritten after every mutation.
/// I/O failures are logged and swallowed: the in-memory view stays
/// authoritative for the lifetime of the process.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, Slot>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("Discarding unreadable cache file {}: {:#}", path.display(), err);
                HashMap::new()
            }
        };

        tracing::debug!("Opened cache file {} with {} entries", path.display(), entries.len());

        Self { path, entries: RwLock::new(entries) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, Slot>) {
        if let Err(err) = write_entries(&self.path, entries) {
            tracing::warn!("Failed to persist cache file {}: {:#}", self.path.display(), err);
        }
    }
}

impl Store for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self, key: &str) -> Option<Slot> {
        self.entries.read().get(key).cloned()
    }

    fn save(&self, key: &str, slot: Slot) {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), slot);
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}

fn read_entries(path: &Path) -> Result<HashMap<String, Slot>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let contents = fs::read(path)
        .with_context(|| format!("Failed to read cache file: {}", path.display()))?;

    serde_json::from_slice(&contents)
        .with_context(|| format!("Failed to parse cache file: {}", path.display()))
}

fn write_entries(path: &Path, entries: &HashMap<String, Slot>) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;

    let json = serde_json::to_vec(entries).context("Failed to serialize cache entries")?;

    // Write a uniquely named sibling, then rename it over the document, so a
    // crash or a concurrent writer never leaves a truncated file behind.
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in: {}", dir.display()))?;
    tmp.write_all(&json)
        .with_context(|| format!("Failed to write cache file: {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace cache file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_save_load_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.load("k"), None);

        store.save("k", Slot::Data(b"v".to_vec()));
        assert_eq!(store.load("k"), Some(Slot::Data(b"v".to_vec())));

        store.remove("k");
        assert_eq!(store.load("k"), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("cache.json");
        let at = DateTime::from_timestamp(1_609_459_200, 0).unwrap();

        {
            let store = FileStore::open(&path);
            store.save("weather:1.0;2.0;en;metric", Slot::Data(b"{}".to_vec()));
            store.save("weather:1.0;2.0;en;metric_expire", Slot::Expiry(at));
        }

        let reopened = FileStore::open(&path);
        assert_eq!(
            reopened.load("weather:1.0;2.0;en;metric"),
            Some(Slot::Data(b"{}".to_vec()))
        );
        assert_eq!(reopened.load("weather:1.0;2.0;en;metric_expire"), Some(Slot::Expiry(at)));
    }

    #[test]
    fn file_store_remove_is_persisted() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cache.json");

        let store = FileStore::open(&path);
        store.save("k", Slot::Data(vec![1, 2, 3]));
        store.remove("k");

        assert_eq!(FileStore::open(&path).load("k"), None);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cache.json");
        fs::write(&path, b"not json").unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.load("anything"), None);

        // The next write replaces the corrupt document.
        store.save("k", Slot::Data(vec![7]));
        assert_eq!(FileStore::open(&path).load("k"), Some(Slot::Data(vec![7])));
    }

    #[test]
    fn failed_write_keeps_value_in_memory_only() {
        let dir = tempfile::tempdir().expect("temp dir");
        // A regular file where the cache directory should be.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let path = blocker.join("cache.json");

        let store = FileStore::open(&path);
        store.save("k", Slot::Data(vec![1]));

        assert_eq!(store.load("k"), Some(Slot::Data(vec![1])));
        assert_eq!(FileStore::open(&path).load("k"), None);
    }

    #[test]
    fn write_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cache.json");

        let store = FileStore::open(&path);
        store.save("a", Slot::Data(vec![1]));
        store.save("b", Slot::Data(vec![2]));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, ["cache.json"]);
    }
}

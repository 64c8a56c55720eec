use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;

/// Error type for blob store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid blob key '{0}': use letters, digits, '-' or '_'")]
    InvalidKey(String),
    #[error("could not access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("simulated write failure for key '{0}'")]
    Injected(String),
}

/// Opaque key-value persistence for serialized trees.
pub trait BlobStore {
    /// Read the blob under `key`, or `None` if nothing has been stored.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Replace the blob under `key`.
    fn set(&mut self, key: &str, blob: &str) -> Result<(), StoreError>;
}

impl<B: BlobStore + ?Sized> BlobStore for Box<B> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, blob: &str) -> Result<(), StoreError> {
        (**self).set(key, blob)
    }
}

fn check_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// One `<key>.json` file per key inside a directory. Writes are atomic.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// The directory is created on first write if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileBlobStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        check_key(key)?;
        let path = self.blob_path(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io { path, source: e }),
        }
    }

    fn set(&mut self, key: &str, blob: &str) -> Result<(), StoreError> {
        check_key(key)?;
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        let path = self.blob_path(key);
        atomic_write(&path, blob.as_bytes()).map_err(|e| StoreError::Io { path, source: e })
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// `HashMap`-backed store. Can be told to fail upcoming writes so save
/// retry paths can be exercised.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, String>,
    failures_left: u32,
    /// Number of `set` calls seen, including failed ones
    pub writes_attempted: u32,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `blob` stored under `key`
    pub fn with_blob(key: &str, blob: &str) -> Self {
        let mut store = Self::default();
        store.blobs.insert(key.to_string(), blob.to_string());
        store
    }

    /// Make the next `n` writes fail
    pub fn fail_next_writes(&mut self, n: u32) {
        self.failures_left = n;
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.blobs.get(key).map(String::as_str)
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        check_key(key)?;
        Ok(self.blobs.get(key).cloned())
    }

    fn set(&mut self, key: &str, blob: &str) -> Result<(), StoreError> {
        check_key(key)?;
        self.writes_attempted += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(StoreError::Injected(key.to_string()));
        }
        self.blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path().join("store"));
        assert!(store.get("tasks").unwrap().is_none());
    }

    #[test]
    fn file_store_set_then_get() {
        let dir = TempDir::new().unwrap();
        let mut store = FileBlobStore::new(dir.path().join("store"));
        store.set("tasks", "{\"a\":1}").unwrap();
        store.set("tasks", "{\"a\":2}").unwrap();
        assert_eq!(store.get("tasks").unwrap().as_deref(), Some("{\"a\":2}"));
        assert!(dir.path().join("store/tasks.json").exists());
    }

    #[test]
    fn keys_are_validated() {
        let dir = TempDir::new().unwrap();
        let mut store = FileBlobStore::new(dir.path());
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn memory_store_injected_failures() {
        let mut store = MemoryBlobStore::new();
        store.fail_next_writes(1);
        assert!(store.set("tasks", "one").is_err());
        store.set("tasks", "two").unwrap();
        assert_eq!(store.raw("tasks"), Some("two"));
        assert_eq!(store.writes_attempted, 2);
    }
}

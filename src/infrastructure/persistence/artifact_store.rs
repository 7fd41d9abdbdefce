//! Artifact Store Implementations
//!
//! - [`FileArtifactStore`]: one JSON file per key under a storage directory,
//!   written atomically (temp file then rename)
//! - [`InMemoryArtifactStore`]: process-local map, for tests and dry runs

use crate::domain::errors::ArtifactError;
use crate::domain::ports::ArtifactStore;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", file_name))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, ArtifactError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("Loaded artifact {} from {:?}", key, path);
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ArtifactError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let io_error = |source| ArtifactError::Io {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_error)?;
        let path = self.path_for(key);

        // Atomic write: write to temp file then rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, bytes).map_err(io_error)?;
        fs::rename(&temp_path, &path).map_err(io_error)?;

        info!("Saved artifact {} to {:?}", key, path);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.root.display())
    }
}

/// Thread-safe in-memory artifact store. Contents are lost on drop.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, ArtifactError> {
        let blobs = self.blobs.read().map_err(|e| ArtifactError::Corrupt {
            key: key.to_string(),
            reason: format!("store lock poisoned: {}", e),
        })?;
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let mut blobs = self.blobs.write().map_err(|e| ArtifactError::Corrupt {
            key: key.to_string(),
            reason: format!("store lock poisoned: {}", e),
        })?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("storecast_{}_{}", name, nanos))
    }

    #[test]
    fn test_file_store_roundtrip() {
        let root = temp_root("roundtrip");
        let store = FileArtifactStore::new(&root);

        assert!(store.load("budget_optimizer").unwrap().is_none());
        store.save("budget_optimizer", b"{\"a\":1}").unwrap();
        assert_eq!(store.load("budget_optimizer").unwrap().unwrap(), b"{\"a\":1}");
        assert!(root.join("budget_optimizer.json").exists());
        assert!(!root.join("budget_optimizer.json.tmp").exists());

        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_file_store_overwrites() {
        let root = temp_root("overwrite");
        let store = FileArtifactStore::new(&root);
        store.save("k", b"one").unwrap();
        store.save("k", b"two").unwrap();
        assert_eq!(store.load("k").unwrap().unwrap(), b"two");
        fs::remove_dir_all(root).ok();
    }

    #[test]
    fn test_key_is_sanitized() {
        let store = FileArtifactStore::new("/tmp/models");
        assert_eq!(
            store.path_for("../escape/key"),
            PathBuf::from("/tmp/models/___escape_key.json")
        );
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryArtifactStore::new();
        assert!(store.is_empty());
        store.save("a", b"1").unwrap();
        assert_eq!(store.load("a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.load("b").unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}

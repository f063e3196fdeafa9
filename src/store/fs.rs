//! Filesystem-backed staging store.
//!
//! Objects live under a root data directory at their key path; labels live in
//! a parallel `.labels/` tree as JSON sidecars so that object content is never
//! rewritten by the tagging step.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use super::{ObjectLabel, StagingStore, StoreError};

const LABEL_DIR: &str = ".labels";

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Resolve `key` below the root, rejecting absolute paths and any
    /// parent-directory components.
    fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let traversal = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || traversal {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    fn label_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        self.object_path(key)
            .map(|_| self.root.join(LABEL_DIR).join(format!("{key}.json")))
    }
}

impl StagingStore for FsStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        // A rewritten object starts over untagged.
        let labels = self.label_path(key)?;
        if labels.exists() {
            fs::remove_file(labels)?;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(key)?;
        if !path.is_file() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(fs::read(path)?)
    }

    fn tag(&self, key: &str, labels: &[ObjectLabel]) -> Result<(), StoreError> {
        if !self.object_path(key)?.is_file() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        let sidecar = self.label_path(key)?;
        if let Some(parent) = sidecar.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(sidecar, serde_json::to_vec(labels)?)?;
        Ok(())
    }

    fn tags(&self, key: &str) -> Result<Vec<ObjectLabel>, StoreError> {
        if !self.object_path(key)?.is_file() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        let sidecar = self.label_path(key)?;
        if !sidecar.is_file() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&fs::read(sidecar)?)?)
    }

    fn arrived_at(&self, key: &str) -> Result<DateTime<Utc>, StoreError> {
        let path = self.object_path(key)?;
        if !path.is_file() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        let modified = fs::metadata(path)?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }
}

//! Filesystem-backed object store.
//!
//! Maps object keys to paths under a root directory, one file per
//! object. Content types are accepted and discarded; the filesystem has
//! nowhere to keep them. Good enough for single-machine competition
//! deployments and for exercising the pipeline against real disks.

use std::path::{Path, PathBuf};

use super::{BoxFuture, ObjectStore, StorageError};

/// Object store rooted at a local directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a key to a path, rejecting keys that would escape the
    /// root directory.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

/// Collects every file under `root`, returned as `/`-separated keys.
async fn walk(root: &Path) -> Result<Vec<String>, StorageError> {
    let mut keys = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
    }
    Ok(keys)
}

impl ObjectStore for FsObjectStore {
    fn list(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let mut keys = walk(&self.root).await?;
            keys.retain(|key| key.starts_with(&prefix));
            keys.sort();
            Ok(keys)
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, StorageError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(key))
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> BoxFuture<'_, Result<(), StorageError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &bytes).await?;
            Ok(())
        })
    }

    fn copy(&self, from: &str, to: &str) -> BoxFuture<'_, Result<(), StorageError>> {
        let from = from.to_string();
        let to = to.to_string();
        Box::pin(async move {
            let bytes = self.get(&from).await?;
            self.put(&to, bytes, "application/octet-stream").await
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<(), StorageError>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                // Deleting an absent object is a success, like any bucket
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

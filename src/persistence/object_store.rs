//! Object storage for serialized snapshots, addressed by bucket and path.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::ObjectStoreError;

/// Bucketed blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Writes `bytes` at `bucket/path`, replacing any existing object.
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), ObjectStoreError>;

    /// Reads the object at `bucket/path`.
    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Deletes the object at `bucket/path`.
    async fn delete(&self, bucket: &str, path: &str) -> Result<(), ObjectStoreError>;
}

/// In-memory [`ObjectStore`] with per-bucket failure injection.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    unavailable: HashSet<String>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation on `bucket` fail.
    #[must_use]
    pub fn with_unavailable_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.unavailable.insert(bucket.into());
        self
    }

    /// Returns `true` if an object exists at `bucket/path`.
    pub async fn contains(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .read()
            .await
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    /// Number of stored objects across all buckets.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Returns `true` if no objects are stored.
    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn check(&self, bucket: &str) -> Result<(), ObjectStoreError> {
        if self.unavailable.contains(bucket) {
            return Err(ObjectStoreError::Unavailable {
                bucket: bucket.to_string(),
                reason: "injected bucket failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        self.check(bucket)?;
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), path.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.check(bucket)?;
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<(), ObjectStoreError> {
        self.check(bucket)?;
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), path.to_string()));
        Ok(())
    }
}

/// [`ObjectStore`] on the local filesystem: one directory per bucket under
/// a root directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Creates a store rooted at `root`. Directories are created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `bucket/path` under the root, rejecting anything that
    /// could escape it.
    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf, ObjectStoreError> {
        let mut resolved = self.root.clone();
        for part in [bucket, path] {
            let rel = Path::new(part);
            if part.is_empty()
                || !rel
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
            {
                return Err(ObjectStoreError::InvalidPath(format!("{bucket}/{path}")));
            }
            resolved.push(rel);
        }
        Ok(resolved)
    }
}

fn unavailable(bucket: &str, err: &std::io::Error) -> ObjectStoreError {
    ObjectStoreError::Unavailable {
        bucket: bucket.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bucket: &str, path: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(bucket, &e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| unavailable(bucket, &e))
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(unavailable(bucket, &e)),
        }
    }

    async fn delete(&self, bucket: &str, path: &str) -> Result<(), ObjectStoreError> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(unavailable(bucket, &e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips_objects() {
        let store = MemoryObjectStore::new();
        assert!(store.put("backups", "U1/a.json", b"{}").await.is_ok());
        assert_eq!(store.get("backups", "U1/a.json").await.unwrap_or_default(), b"{}");
        assert!(store.delete("backups", "U1/a.json").await.is_ok());
        assert!(matches!(
            store.get("backups", "U1/a.json").await,
            Err(ObjectStoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn memory_store_fails_unavailable_bucket() {
        let store = MemoryObjectStore::new().with_unavailable_bucket("backups");
        assert!(store.put("backups", "x", b"1").await.is_err());
        assert!(store.put("attachments", "x", b"1").await.is_ok());
    }

    #[tokio::test]
    async fn fs_store_writes_nested_paths() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let store = FsObjectStore::new(dir.path());
        assert!(store.put("backups", "U1/backup-U1-x.json", b"data").await.is_ok());
        assert!(dir.path().join("backups/U1/backup-U1-x.json").exists());
        assert_eq!(
            store.get("backups", "U1/backup-U1-x.json").await.unwrap_or_default(),
            b"data"
        );
        assert!(store.delete("backups", "U1/backup-U1-x.json").await.is_ok());
        assert!(store.delete("backups", "U1/backup-U1-x.json").await.is_ok());
    }

    #[tokio::test]
    async fn fs_store_rejects_escaping_paths() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let store = FsObjectStore::new(dir.path());
        assert!(matches!(
            store.put("backups", "../etc/passwd", b"x").await,
            Err(ObjectStoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.get("/abs", "x").await,
            Err(ObjectStoreError::InvalidPath(_))
        ));
    }
}

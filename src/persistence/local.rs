//! Local key-value store: the device-side namespace of string pairs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::error::LocalStoreError;
use crate::domain::OwnerId;

/// Asynchronous string key-value store.
#[async_trait]
pub trait LocalStore: Send + Sync + std::fmt::Debug {
    /// Lists every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, LocalStoreError>;

    /// Reads one key.
    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    /// Writes one key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    /// Removes every key.
    async fn clear(&self) -> Result<(), LocalStoreError>;
}

/// In-memory [`LocalStore`] with optional per-key read failures.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    entries: RwLock<BTreeMap<String, String>>,
    failing_reads: HashSet<String>,
}

impl MemoryLocalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `pairs`.
    #[must_use]
    pub fn with_entries<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            failing_reads: HashSet::new(),
        }
    }

    /// Makes every read of `key` fail.
    #[must_use]
    pub fn with_failing_read(mut self, key: impl Into<String>) -> Self {
        self.failing_reads.insert(key.into());
        self
    }

    /// Returns a copy of the current contents.
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn keys(&self) -> Result<Vec<String>, LocalStoreError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        if self.failing_reads.contains(key) {
            return Err(LocalStoreError::Io {
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            });
        }
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), LocalStoreError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// [`LocalStore`] persisted as a single JSON object on disk.
///
/// Every operation re-reads the file so external edits are observed; writes
/// go through a temporary file and a rename.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLocalStore {
    /// Opens (without creating) the store at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, LocalStoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(io_error("", &e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| LocalStoreError::Corrupt(e.to_string()))
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), LocalStoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("", &e))?;
        }
        let bytes =
            serde_json::to_vec_pretty(entries).map_err(|e| LocalStoreError::Corrupt(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error("", &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error("", &e))
    }
}

fn io_error(key: &str, err: &std::io::Error) -> LocalStoreError {
    LocalStoreError::Io {
        key: key.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl LocalStore for FileLocalStore {
    async fn keys(&self) -> Result<Vec<String>, LocalStoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn clear(&self) -> Result<(), LocalStoreError> {
        let _guard = self.lock.lock().await;
        self.save(&BTreeMap::new()).await
    }
}

/// Hands each identity its own [`LocalStore`].
pub trait LocalStoreProvider: Send + Sync + std::fmt::Debug {
    /// Store holding `owner`'s local namespace.
    fn store_for(&self, owner: &OwnerId) -> Arc<dyn LocalStore>;
}

/// One [`MemoryLocalStore`] per identity, created empty on first use.
#[derive(Debug, Default)]
pub struct MemoryLocalStores {
    stores: std::sync::Mutex<HashMap<OwnerId, Arc<MemoryLocalStore>>>,
}

impl MemoryLocalStores {
    /// Creates a provider with no stores yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `store` as `owner`'s namespace.
    #[must_use]
    pub fn with_store(self, owner: OwnerId, store: Arc<MemoryLocalStore>) -> Self {
        self.stores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner, store);
        self
    }

    /// Returns `owner`'s store, creating an empty one if needed.
    pub fn store(&self, owner: &OwnerId) -> Arc<MemoryLocalStore> {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(stores.entry(owner.clone()).or_default())
    }
}

impl LocalStoreProvider for MemoryLocalStores {
    fn store_for(&self, owner: &OwnerId) -> Arc<dyn LocalStore> {
        self.store(owner)
    }
}

/// One [`FileLocalStore`] per identity at `<root>/<owner>.json`.
#[derive(Debug, Clone)]
pub struct FileLocalStores {
    root: PathBuf,
}

impl FileLocalStores {
    /// Keeps per-identity files under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File backing `owner`'s store.
    #[must_use]
    pub fn path_for(&self, owner: &OwnerId) -> PathBuf {
        self.root.join(format!("{owner}.json"))
    }
}

impl LocalStoreProvider for FileLocalStores {
    fn store_for(&self, owner: &OwnerId) -> Arc<dyn LocalStore> {
        Arc::new(FileLocalStore::new(self.path_for(owner)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_reads_back_writes() {
        let store = MemoryLocalStore::new();
        assert!(store.set("user.theme", "dark").await.is_ok());
        let Ok(value) = store.get("user.theme").await else {
            panic!("read failed");
        };
        assert_eq!(value.as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn memory_store_injects_read_failures() {
        let store = MemoryLocalStore::with_entries([("a", "1")]).with_failing_read("a");
        assert!(store.get("a").await.is_err());
        assert_eq!(store.keys().await.unwrap_or_default(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let path = dir.path().join("nested").join("local.json");

        let store = FileLocalStore::new(&path);
        assert!(store.set("settings.lang", "fr").await.is_ok());
        assert!(store.set("user.theme", "dark").await.is_ok());

        let reopened = FileLocalStore::new(&path);
        let keys = reopened.keys().await.unwrap_or_default();
        assert_eq!(keys, vec!["settings.lang".to_string(), "user.theme".to_string()]);

        assert!(reopened.clear().await.is_ok());
        assert!(store.keys().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let store = FileLocalStore::new(dir.path().join("absent.json"));
        assert!(store.keys().await.unwrap_or_default().is_empty());
        assert_eq!(store.get("x").await.ok().flatten(), None);
    }

    #[tokio::test]
    async fn file_store_reports_corruption() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let path = dir.path().join("local.json");
        assert!(tokio::fs::write(&path, b"[1,2,3]").await.is_ok());
        let store = FileLocalStore::new(&path);
        assert!(matches!(store.keys().await, Err(LocalStoreError::Corrupt(_))));
    }

    fn owner(id: &str) -> OwnerId {
        let Some(owner) = OwnerId::parse(id) else {
            panic!("valid owner");
        };
        owner
    }

    #[tokio::test]
    async fn memory_provider_keeps_owners_apart() {
        let seeded = Arc::new(MemoryLocalStore::with_entries([("user.theme", "dark")]));
        let stores = MemoryLocalStores::new().with_store(owner("U1"), Arc::clone(&seeded));

        let u1 = stores.store_for(&owner("U1"));
        let u2 = stores.store_for(&owner("U2"));
        assert_eq!(u1.keys().await.unwrap_or_default(), vec!["user.theme".to_string()]);
        assert!(u2.keys().await.unwrap_or_default().is_empty());

        assert!(u2.set("user.theme", "light").await.is_ok());
        assert!(u2.clear().await.is_ok());
        assert_eq!(
            seeded.snapshot().await.get("user.theme").map(String::as_str),
            Some("dark")
        );
        assert!(Arc::ptr_eq(&stores.store(&owner("U2")), &stores.store(&owner("U2"))));
    }

    #[tokio::test]
    async fn file_provider_uses_one_file_per_owner() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let stores = FileLocalStores::new(dir.path());
        assert_eq!(stores.path_for(&owner("U1")), dir.path().join("U1.json"));

        let u1 = stores.store_for(&owner("U1"));
        let u2 = stores.store_for(&owner("U2"));
        assert!(u1.set("user.theme", "dark").await.is_ok());
        assert!(u2.clear().await.is_ok());

        let reopened = stores.store_for(&owner("U1"));
        assert_eq!(reopened.get("user.theme").await.ok().flatten().as_deref(), Some("dark"));
        assert!(u2.keys().await.unwrap_or_default().is_empty());
    }
}

//! Best-effort collection of local and remote state.
//!
//! Neither collector ever fails: a key or table that cannot be read is
//! logged and left out (local) or recorded as empty (remote).

use std::sync::Arc;

use futures_util::future::join_all;

use crate::domain::{LocalDataset, OwnerId, RemoteDataset, RemoteTable};
use crate::persistence::{LocalStore, RemoteTables};

/// Default key prefixes retained from the local store.
pub const DEFAULT_RETAINED_PREFIXES: [&str; 3] = ["app.", "user.", "settings."];

/// Reads the allow-listed part of the local key-value store.
#[derive(Debug, Clone)]
pub struct LocalDataCollector {
    store: Arc<dyn LocalStore>,
    prefixes: Vec<String>,
}

impl LocalDataCollector {
    /// Creates a collector keeping keys that start with one of `prefixes`.
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>, prefixes: Vec<String>) -> Self {
        Self { store, prefixes }
    }

    /// Returns `true` if `key` falls in a retained namespace.
    #[must_use]
    pub fn is_retained(&self, key: &str) -> bool {
        self.prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Collects every retained key that could be read.
    pub async fn collect(&self) -> LocalDataset {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "could not enumerate local keys; collecting nothing");
                return LocalDataset::new();
            }
        };

        let mut dataset = LocalDataset::new();
        let mut skipped = 0usize;
        for key in keys.into_iter().filter(|k| self.is_retained(k)) {
            match self.store.get(&key).await {
                Ok(Some(value)) => {
                    dataset.insert(key, value);
                }
                Ok(None) => {}
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(%key, error = %e, "skipping unreadable local key");
                }
            }
        }
        tracing::debug!(collected = dataset.len(), skipped, "collected local data");
        dataset
    }
}

/// Reads the identity's rows from every [`RemoteTable`].
#[derive(Debug, Clone)]
pub struct RemoteDataCollector {
    tables: Arc<dyn RemoteTables>,
}

impl RemoteDataCollector {
    /// Creates a collector over `tables`.
    #[must_use]
    pub fn new(tables: Arc<dyn RemoteTables>) -> Self {
        Self { tables }
    }

    /// Collects `owner`'s rows from every table concurrently.
    ///
    /// The result always has one entry per table; a table whose query
    /// failed maps to an empty sequence.
    pub async fn collect(&self, owner: &OwnerId) -> RemoteDataset {
        let queries = RemoteTable::ALL.into_iter().map(|table| {
            let tables = Arc::clone(&self.tables);
            async move { (table, tables.fetch_owned(table, owner).await) }
        });

        let mut dataset = RemoteDataset::new();
        for (table, result) in join_all(queries).await {
            let rows = result.unwrap_or_else(|e| {
                tracing::warn!(%owner, %table, error = %e, "table collection failed; recording empty");
                Vec::new()
            });
            dataset.insert(table.name().to_string(), rows);
        }
        dataset
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{FieldValue, Row};
    use crate::persistence::{MemoryLocalStore, MemoryRemoteTables};

    fn owner() -> OwnerId {
        let Some(owner) = OwnerId::parse("U1") else {
            panic!("valid owner");
        };
        owner
    }

    fn prefixes() -> Vec<String> {
        DEFAULT_RETAINED_PREFIXES.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn local_keeps_only_allow_listed_prefixes() {
        let store = MemoryLocalStore::with_entries([
            ("user.theme", "dark"),
            ("settings.lang", "ar"),
            ("cache.thumbnails", "blob"),
        ]);
        let collector = LocalDataCollector::new(Arc::new(store), prefixes());
        let data = collector.collect().await;
        assert_eq!(data.len(), 2);
        assert!(data.contains_key("user.theme"));
        assert!(!data.contains_key("cache.thumbnails"));
    }

    #[tokio::test]
    async fn local_skips_unreadable_keys() {
        let store = MemoryLocalStore::with_entries([("user.a", "1"), ("user.b", "2")])
            .with_failing_read("user.a");
        let collector = LocalDataCollector::new(Arc::new(store), prefixes());
        let data = collector.collect().await;
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["user.b"]);
    }

    #[tokio::test]
    async fn remote_records_failed_tables_as_empty() {
        let tables = MemoryRemoteTables::new()
            .with_failing_table(RemoteTable::Reports)
            .with_missing_table(RemoteTable::Files);
        let row = Row::from([("id".to_string(), FieldValue::from("S1"))]);
        tables.seed(RemoteTable::Students, &owner(), vec![row.clone()]).await;

        let collector = RemoteDataCollector::new(Arc::new(tables));
        let data = collector.collect(&owner()).await;

        assert_eq!(data.len(), RemoteTable::ALL.len());
        assert_eq!(data.get("students"), Some(&vec![row]));
        assert_eq!(data.get("reports"), Some(&Vec::new()));
        assert_eq!(data.get("files"), Some(&Vec::new()));
    }
}

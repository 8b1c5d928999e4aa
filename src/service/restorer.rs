//! Destructive restore of local and remote state from a snapshot.

use std::sync::Arc;

use crate::domain::{LocalDataset, OwnerId, RemoteDataset, RemoteTable};
use crate::error::BackupError;
use crate::persistence::{LocalStore, RemoteTables};

/// Replaces the entire local store with a snapshot's local data.
#[derive(Debug, Clone)]
pub struct LocalRestorer {
    store: Arc<dyn LocalStore>,
}

impl LocalRestorer {
    /// Creates a restorer over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Clears the store, including keys outside the retained namespaces,
    /// then writes every snapshot entry.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::LocalStore`] on the first failed write.
    pub async fn restore(&self, data: &LocalDataset) -> Result<(), BackupError> {
        self.store.clear().await?;
        for (key, value) in data {
            self.store.set(key, value).await?;
        }
        tracing::debug!(keys = data.len(), "local store restored");
        Ok(())
    }
}

/// Replaces an owner's rows in every remote table.
#[derive(Debug, Clone)]
pub struct RemoteRestorer {
    tables: Arc<dyn RemoteTables>,
}

impl RemoteRestorer {
    /// Creates a restorer over `tables`.
    #[must_use]
    pub fn new(tables: Arc<dyn RemoteTables>) -> Self {
        Self { tables }
    }

    /// Restores tables one at a time in [`RemoteTable::ALL`] order. A table
    /// absent from the snapshot is restored as empty. Unknown table names
    /// in the snapshot are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::RemoteStore`] on the first failing table;
    /// tables before it stay restored.
    pub async fn restore(&self, owner: &OwnerId, data: &RemoteDataset) -> Result<(), BackupError> {
        for name in data.keys().filter(|name| RemoteTable::from_name(name).is_none()) {
            tracing::warn!(table = %name, "ignoring unknown table in snapshot");
        }
        for table in RemoteTable::ALL {
            let rows = data.get(table.name()).map_or(&[][..], Vec::as_slice);
            self.tables.replace_owned(table, owner, rows).await?;
            tracing::debug!(%owner, %table, rows = rows.len(), "table restored");
        }
        Ok(())
    }
}

//! Backup catalog: queryable records of stored snapshots.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::CatalogError;
use crate::domain::{BackupId, BackupStatus, CatalogEntry, OwnerId};

/// Whether the catalog table exists.
///
/// Probed when an orchestrator is constructed, and again before each
/// catalog use while missing, so call sites branch on a typed state
/// instead of each inspecting driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    /// The catalog is available.
    Provisioned,
    /// The catalog table is missing; backups still work but are unlisted.
    Unprovisioned,
}

/// Storage for [`CatalogEntry`] rows.
#[async_trait]
pub trait CatalogStore: Send + Sync + std::fmt::Debug {
    /// Checks that the catalog exists.
    async fn probe(&self) -> Result<(), CatalogError>;

    /// Inserts `entry` and returns it as stored.
    async fn insert(&self, entry: &CatalogEntry) -> Result<CatalogEntry, CatalogError>;

    /// Lists `owner`'s entries, newest first.
    async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Looks up one of `owner`'s entries.
    async fn get(&self, id: &BackupId, owner: &OwnerId)
    -> Result<Option<CatalogEntry>, CatalogError>;

    /// Deletes one of `owner`'s entries. Returns `false` if none matched.
    async fn delete(&self, id: &BackupId, owner: &OwnerId) -> Result<bool, CatalogError>;

    /// Moves an entry to `status` if the transition is allowed. Returns
    /// `false` if no entry matched or the transition was refused.
    async fn set_status(
        &self,
        id: &BackupId,
        owner: &OwnerId,
        status: BackupStatus,
    ) -> Result<bool, CatalogError>;
}

/// Probes `catalog` and folds the result into a [`ProvisioningState`].
///
/// Errors other than a missing catalog count as provisioned so that real
/// failures surface from the operations that hit them.
pub async fn probe_provisioning(catalog: &dyn CatalogStore) -> ProvisioningState {
    match catalog.probe().await {
        Ok(()) => ProvisioningState::Provisioned,
        Err(CatalogError::Unprovisioned) => {
            tracing::warn!("backup catalog is not provisioned; backups will not be listable");
            ProvisioningState::Unprovisioned
        }
        Err(e) => {
            tracing::warn!(error = %e, "catalog probe failed; assuming provisioned");
            ProvisioningState::Provisioned
        }
    }
}

/// In-memory [`CatalogStore`].
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: RwLock<HashMap<BackupId, CatalogEntry>>,
    unprovisioned: AtomicBool,
    failing_inserts: bool,
}

impl MemoryCatalog {
    /// Creates an empty, provisioned catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog that behaves as if its table did not exist.
    #[must_use]
    pub fn unprovisioned() -> Self {
        Self {
            unprovisioned: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Creates the missing table: later calls see a provisioned catalog.
    pub fn provision(&self) {
        self.unprovisioned.store(false, Ordering::Release);
    }

    /// Makes every insert fail with a non-provisioning error.
    #[must_use]
    pub fn with_failing_inserts(mut self) -> Self {
        self.failing_inserts = true;
        self
    }

    fn check(&self) -> Result<(), CatalogError> {
        if self.unprovisioned.load(Ordering::Acquire) {
            Err(CatalogError::Unprovisioned)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn probe(&self) -> Result<(), CatalogError> {
        self.check()
    }

    async fn insert(&self, entry: &CatalogEntry) -> Result<CatalogEntry, CatalogError> {
        self.check()?;
        if self.failing_inserts {
            return Err(CatalogError::Query("injected insert failure".to_string()));
        }
        let mut entries = self.entries.write().await;
        if entries.contains_key(&entry.id) {
            return Err(CatalogError::Query(format!("duplicate backup id {}", entry.id)));
        }
        entries.insert(entry.id.clone(), entry.clone());
        Ok(entry.clone())
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.check()?;
        let mut owned: Vec<CatalogEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| &e.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn get(
        &self,
        id: &BackupId,
        owner: &OwnerId,
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        self.check()?;
        Ok(self
            .entries
            .read()
            .await
            .get(id)
            .filter(|e| &e.owner_id == owner)
            .cloned())
    }

    async fn delete(&self, id: &BackupId, owner: &OwnerId) -> Result<bool, CatalogError> {
        self.check()?;
        let mut entries = self.entries.write().await;
        if entries.get(id).is_some_and(|e| &e.owner_id == owner) {
            entries.remove(id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn set_status(
        &self,
        id: &BackupId,
        owner: &OwnerId,
        status: BackupStatus,
    ) -> Result<bool, CatalogError> {
        self.check()?;
        let mut entries = self.entries.write().await;
        match entries.get_mut(id) {
            Some(entry) if &entry.owner_id == owner && entry.status.can_transition_to(status) => {
                entry.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::domain::{BackupType, StorageLocation, StoredObject};

    fn owner(id: &str) -> OwnerId {
        let Some(owner) = OwnerId::parse(id) else {
            panic!("valid owner");
        };
        owner
    }

    fn entry(owner_id: &str, minutes_ago: i64) -> CatalogEntry {
        CatalogEntry::for_object(
            BackupId::generate(),
            StoredObject {
                owner_id: owner(owner_id),
                backup_type: BackupType::Manual,
                location: StorageLocation {
                    bucket: "backups".to_string(),
                    path: format!("{owner_id}/b.json"),
                },
                size_bytes: 10,
                stored_at: Utc::now() - Duration::minutes(minutes_ago),
                metadata: serde_json::Value::Null,
            },
            "backups",
            Duration::days(90),
        )
    }

    #[tokio::test]
    async fn list_is_owner_scoped_and_newest_first() {
        let catalog = MemoryCatalog::new();
        let older = entry("U1", 10);
        let newer = entry("U1", 1);
        let other = entry("U2", 0);
        for e in [&older, &newer, &other] {
            assert!(catalog.insert(e).await.is_ok());
        }

        let listed = catalog.list(&owner("U1")).await.unwrap_or_default();
        let ids: Vec<_> = listed.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn get_and_delete_respect_ownership() {
        let catalog = MemoryCatalog::new();
        let e = entry("U1", 0);
        assert!(catalog.insert(&e).await.is_ok());

        assert!(matches!(catalog.get(&e.id, &owner("U2")).await, Ok(None)));
        assert!(matches!(catalog.delete(&e.id, &owner("U2")).await, Ok(false)));
        assert!(matches!(catalog.delete(&e.id, &owner("U1")).await, Ok(true)));
        assert!(matches!(catalog.get(&e.id, &owner("U1")).await, Ok(None)));
    }

    #[tokio::test]
    async fn set_status_enforces_transitions() {
        let catalog = MemoryCatalog::new();
        let e = entry("U1", 0);
        assert!(catalog.insert(&e).await.is_ok());

        let u1 = owner("U1");
        assert!(matches!(catalog.set_status(&e.id, &u1, BackupStatus::Restored).await, Ok(true)));
        assert!(matches!(catalog.set_status(&e.id, &u1, BackupStatus::Expired).await, Ok(false)));
        assert!(matches!(catalog.set_status(&e.id, &u1, BackupStatus::Active).await, Ok(false)));
    }

    #[tokio::test]
    async fn probe_reports_unprovisioned() {
        assert_eq!(
            probe_provisioning(&MemoryCatalog::unprovisioned()).await,
            ProvisioningState::Unprovisioned
        );
        assert_eq!(
            probe_provisioning(&MemoryCatalog::new()).await,
            ProvisioningState::Provisioned
        );
    }
}

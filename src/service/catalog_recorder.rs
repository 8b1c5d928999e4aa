//! Owner-scoped catalog queries that degrade when the catalog is missing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{BackupId, BackupStatus, CatalogEntry, OwnerId};
use crate::error::BackupError;
use crate::persistence::error::CatalogError;
use crate::persistence::{CatalogStore, ProvisioningState};

/// Reads and maintains one owner's catalog entries.
///
/// An unprovisioned catalog is re-probed on every use until the table
/// shows up; once provisioned the state is never downgraded.
#[derive(Debug)]
pub struct CatalogRecorder {
    catalog: Arc<dyn CatalogStore>,
    provisioned: AtomicBool,
}

impl CatalogRecorder {
    /// Creates a recorder over `catalog` in the given provisioning state.
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogStore>, provisioning: ProvisioningState) -> Self {
        Self {
            catalog,
            provisioned: AtomicBool::new(provisioning == ProvisioningState::Provisioned),
        }
    }

    /// Last known provisioning state, without probing.
    #[must_use]
    pub fn provisioning(&self) -> ProvisioningState {
        if self.provisioned.load(Ordering::Acquire) {
            ProvisioningState::Provisioned
        } else {
            ProvisioningState::Unprovisioned
        }
    }

    /// Provisioning state, re-probing the catalog if it was missing.
    pub async fn refresh_provisioning(&self) -> ProvisioningState {
        if self.provisioned.load(Ordering::Acquire) {
            return ProvisioningState::Provisioned;
        }
        match self.catalog.probe().await {
            Ok(()) => {
                self.provisioned.store(true, Ordering::Release);
                tracing::info!("backup catalog is now provisioned");
                ProvisioningState::Provisioned
            }
            Err(e) => {
                tracing::debug!(error = %e, "backup catalog still unavailable");
                ProvisioningState::Unprovisioned
            }
        }
    }

    /// Lists `owner`'s entries newest first. An unprovisioned catalog
    /// yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::CatalogReadFailure`] for other query failures.
    pub async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>, BackupError> {
        if self.refresh_provisioning().await == ProvisioningState::Unprovisioned {
            return Ok(Vec::new());
        }
        match self.catalog.list(owner).await {
            Ok(entries) => Ok(entries),
            Err(CatalogError::Unprovisioned) => Ok(Vec::new()),
            Err(e) => Err(BackupError::CatalogReadFailure(e)),
        }
    }

    /// Looks up one entry.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] if no entry with `id` belongs to
    /// `owner` (including when the catalog is unprovisioned), and
    /// [`BackupError::CatalogReadFailure`] if the query fails.
    pub async fn get(&self, id: &BackupId, owner: &OwnerId) -> Result<CatalogEntry, BackupError> {
        if self.refresh_provisioning().await == ProvisioningState::Unprovisioned {
            return Err(BackupError::NotFound(id.clone()));
        }
        match self.catalog.get(id, owner).await {
            Ok(Some(entry)) => Ok(entry),
            Ok(None) | Err(CatalogError::Unprovisioned) => Err(BackupError::NotFound(id.clone())),
            Err(e) => Err(BackupError::CatalogReadFailure(e)),
        }
    }

    /// Removes one entry. Returns `false` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::CatalogReadFailure`] if the delete fails.
    pub async fn delete(&self, id: &BackupId, owner: &OwnerId) -> Result<bool, BackupError> {
        if self.refresh_provisioning().await == ProvisioningState::Unprovisioned {
            return Ok(false);
        }
        match self.catalog.delete(id, owner).await {
            Ok(deleted) => Ok(deleted),
            Err(CatalogError::Unprovisioned) => Ok(false),
            Err(e) => Err(BackupError::CatalogReadFailure(e)),
        }
    }

    /// Moves an entry to `status`, logging instead of failing.
    pub async fn mark(&self, id: &BackupId, owner: &OwnerId, status: BackupStatus) {
        match self.catalog.set_status(id, owner, status).await {
            Ok(true) => tracing::debug!(%id, %status, "catalog status updated"),
            Ok(false) => tracing::debug!(%id, %status, "catalog status unchanged"),
            Err(e) => tracing::warn!(%id, %status, error = %e, "failed to update catalog status"),
        }
    }
}

//! Writes serialized snapshots to object storage and catalogues them.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::domain::{BackupId, BackupType, CatalogEntry, OwnerId, StorageLocation, StoredObject};
use crate::error::BackupError;
use crate::persistence::error::CatalogError;
use crate::persistence::{CatalogStore, ObjectStore, ProvisioningState};

/// Path-safe timestamp used in object paths and synthesized ids.
#[must_use]
pub fn path_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
        .replace([':', '.'], "-")
}

/// Object path of a snapshot uploaded by `owner` at `at`.
#[must_use]
pub fn backup_object_path(owner: &OwnerId, at: DateTime<Utc>) -> String {
    let stamp = path_stamp(at);
    format!("{owner}/backup-{owner}-{stamp}.json")
}

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Catalog id, or a synthesized id when the catalog is unprovisioned.
    pub id: BackupId,
    /// Where the bytes landed.
    pub location: StorageLocation,
    /// The stored catalog row, absent when the catalog is unprovisioned.
    pub entry: Option<CatalogEntry>,
}

/// Uploads snapshots with a primary/fallback bucket strategy.
#[derive(Debug, Clone)]
pub struct ObjectStoreUploader {
    objects: Arc<dyn ObjectStore>,
    catalog: Arc<dyn CatalogStore>,
    primary_bucket: String,
    fallback_bucket: String,
    retention: Duration,
}

impl ObjectStoreUploader {
    /// Creates an uploader.
    #[must_use]
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        catalog: Arc<dyn CatalogStore>,
        primary_bucket: impl Into<String>,
        fallback_bucket: impl Into<String>,
        retention: Duration,
    ) -> Self {
        Self {
            objects,
            catalog,
            primary_bucket: primary_bucket.into(),
            fallback_bucket: fallback_bucket.into(),
            retention,
        }
    }

    /// Stores `bytes` and records a catalog entry.
    ///
    /// The primary bucket is tried first, then the fallback bucket. If the
    /// catalog is unprovisioned the backup is stored but unlisted and gets
    /// a synthesized id. If the catalog rejects the insert for any other
    /// reason the orphaned object is deleted on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::StorageWriteFailure`] with the primary
    /// bucket's error when both buckets fail, and
    /// [`BackupError::CatalogWriteFailure`] when a provisioned catalog
    /// rejects the insert.
    pub async fn upload(
        &self,
        bytes: &[u8],
        owner: &OwnerId,
        backup_type: BackupType,
        provisioning: ProvisioningState,
        metadata: serde_json::Value,
    ) -> Result<UploadReceipt, BackupError> {
        let stored_at = Utc::now();
        let path = backup_object_path(owner, stored_at);
        let location = self.store(&path, bytes).await?;

        let object = StoredObject {
            owner_id: owner.clone(),
            backup_type,
            location: location.clone(),
            size_bytes: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            stored_at,
            metadata,
        };
        let synthesized = || BackupId::synthesized(owner, &path_stamp(stored_at));

        if provisioning == ProvisioningState::Unprovisioned {
            tracing::warn!(%owner, %location, "catalog unprovisioned; backup stored but unlisted");
            return Ok(UploadReceipt {
                id: synthesized(),
                location,
                entry: None,
            });
        }

        let entry = CatalogEntry::for_object(
            BackupId::generate(),
            object,
            &self.primary_bucket,
            self.retention,
        );
        match self.catalog.insert(&entry).await {
            Ok(stored) => {
                tracing::info!(%owner, id = %stored.id, %location, size = stored.total_size, "backup catalogued");
                Ok(UploadReceipt {
                    id: stored.id.clone(),
                    location,
                    entry: Some(stored),
                })
            }
            Err(CatalogError::Unprovisioned) => {
                tracing::warn!(%owner, %location, "catalog disappeared; backup stored but unlisted");
                Ok(UploadReceipt {
                    id: synthesized(),
                    location,
                    entry: None,
                })
            }
            Err(e) => {
                if let Err(cleanup) = self.objects.delete(&location.bucket, &location.path).await {
                    tracing::warn!(%location, error = %cleanup, "failed to remove orphaned backup object");
                }
                Err(BackupError::CatalogWriteFailure(e))
            }
        }
    }

    async fn store(&self, path: &str, bytes: &[u8]) -> Result<StorageLocation, BackupError> {
        let primary = StorageLocation {
            bucket: self.primary_bucket.clone(),
            path: path.to_string(),
        };
        let primary_err = match self.objects.put(&primary.bucket, path, bytes).await {
            Ok(()) => return Ok(primary),
            Err(e) => e,
        };
        tracing::warn!(location = %primary, error = %primary_err, "primary bucket write failed; trying fallback");

        let fallback = StorageLocation {
            bucket: self.fallback_bucket.clone(),
            path: path.to_string(),
        };
        match self.objects.put(&fallback.bucket, path, bytes).await {
            Ok(()) => Ok(fallback),
            Err(e) => {
                tracing::error!(location = %fallback, error = %e, "fallback bucket write failed");
                Err(BackupError::StorageWriteFailure {
                    location: primary,
                    source: primary_err,
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryCatalog, MemoryObjectStore};

    fn owner() -> OwnerId {
        let Some(owner) = OwnerId::parse("U1") else {
            panic!("valid owner");
        };
        owner
    }

    fn uploader(objects: Arc<MemoryObjectStore>, catalog: Arc<MemoryCatalog>) -> ObjectStoreUploader {
        ObjectStoreUploader::new(objects, catalog, "backups", "attachments", Duration::days(90))
    }

    #[test]
    fn object_path_is_owner_scoped_and_path_safe() {
        let Ok(at) = DateTime::parse_from_rfc3339("2026-03-01T10:20:30.123456Z") else {
            panic!("valid timestamp");
        };
        let path = backup_object_path(&owner(), at.with_timezone(&Utc));
        assert_eq!(path, "U1/backup-U1-2026-03-01T10-20-30-123456Z.json");
    }

    #[tokio::test]
    async fn primary_upload_is_catalogued() {
        let objects = Arc::new(MemoryObjectStore::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let receipt = uploader(Arc::clone(&objects), Arc::clone(&catalog))
            .upload(b"{}", &owner(), BackupType::Manual, ProvisioningState::Provisioned, serde_json::Value::Null)
            .await;
        let Ok(receipt) = receipt else {
            panic!("upload failed");
        };
        assert_eq!(receipt.location.bucket, "backups");
        assert!(objects.contains("backups", &receipt.location.path).await);
        assert!(matches!(catalog.get(&receipt.id, &owner()).await, Ok(Some(_))));
    }

    #[tokio::test]
    async fn primary_failure_falls_back() {
        let objects = Arc::new(MemoryObjectStore::new().with_unavailable_bucket("backups"));
        let catalog = Arc::new(MemoryCatalog::new());
        let Ok(receipt) = uploader(Arc::clone(&objects), catalog)
            .upload(b"{}", &owner(), BackupType::Manual, ProvisioningState::Provisioned, serde_json::Value::Null)
            .await
        else {
            panic!("upload failed");
        };
        assert_eq!(receipt.location.bucket, "attachments");
        let Some(entry) = receipt.entry else {
            panic!("entry expected");
        };
        assert!(entry.file_path.starts_with("attachments/"));
    }

    #[tokio::test]
    async fn both_buckets_failing_reports_primary_error() {
        let objects = Arc::new(
            MemoryObjectStore::new()
                .with_unavailable_bucket("backups")
                .with_unavailable_bucket("attachments"),
        );
        let result = uploader(objects, Arc::new(MemoryCatalog::new()))
            .upload(b"{}", &owner(), BackupType::Manual, ProvisioningState::Provisioned, serde_json::Value::Null)
            .await;
        assert!(matches!(
            result,
            Err(BackupError::StorageWriteFailure { ref location, .. }) if location.bucket == "backups"
        ));
    }

    #[tokio::test]
    async fn unprovisioned_catalog_synthesizes_id() {
        let objects = Arc::new(MemoryObjectStore::new());
        let Ok(receipt) = uploader(Arc::clone(&objects), Arc::new(MemoryCatalog::unprovisioned()))
            .upload(b"{}", &owner(), BackupType::Manual, ProvisioningState::Unprovisioned, serde_json::Value::Null)
            .await
        else {
            panic!("upload failed");
        };
        assert!(receipt.id.is_synthesized());
        assert!(receipt.entry.is_none());
        assert_eq!(objects.len().await, 1);
    }

    #[tokio::test]
    async fn catalog_failure_removes_orphaned_object() {
        let objects = Arc::new(MemoryObjectStore::new());
        let catalog = Arc::new(MemoryCatalog::new().with_failing_inserts());
        let result = uploader(Arc::clone(&objects), catalog)
            .upload(b"{}", &owner(), BackupType::Manual, ProvisioningState::Provisioned, serde_json::Value::Null)
            .await;
        assert!(matches!(result, Err(BackupError::CatalogWriteFailure(_))));
        assert!(objects.is_empty().await);
    }
}

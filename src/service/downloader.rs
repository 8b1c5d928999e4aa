//! Fetches and decodes catalogued snapshots.

use std::sync::Arc;

use crate::domain::{CatalogEntry, Snapshot, StorageLocation};
use crate::error::BackupError;
use crate::persistence::ObjectStore;

use super::snapshot_builder::SnapshotCodec;

/// Resolves a catalog entry to its object and decodes it.
#[derive(Debug, Clone)]
pub struct SnapshotDownloader {
    objects: Arc<dyn ObjectStore>,
    codec: Arc<dyn SnapshotCodec>,
    primary_bucket: String,
    fallback_bucket: String,
}

impl SnapshotDownloader {
    /// Creates a downloader.
    #[must_use]
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        codec: Arc<dyn SnapshotCodec>,
        primary_bucket: impl Into<String>,
        fallback_bucket: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            codec,
            primary_bucket: primary_bucket.into(),
            fallback_bucket: fallback_bucket.into(),
        }
    }

    /// Location of `entry`'s object, honouring the fallback prefix.
    #[must_use]
    pub fn locate(&self, entry: &CatalogEntry) -> StorageLocation {
        StorageLocation::from_recorded(
            &entry.file_path,
            &entry.owner_id,
            &self.primary_bucket,
            &self.fallback_bucket,
        )
    }

    /// Downloads and decodes `entry`'s snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::StorageReadFailure`] if the object cannot be
    /// fetched, or the codec's error if it cannot be decoded.
    pub async fn download(&self, entry: &CatalogEntry) -> Result<Snapshot, BackupError> {
        let location = self.locate(entry);
        let bytes = self
            .objects
            .get(&location.bucket, &location.path)
            .await
            .map_err(|source| BackupError::StorageReadFailure {
                location: location.clone(),
                source,
            })?;
        tracing::debug!(id = %entry.id, %location, size = bytes.len(), "downloaded snapshot");
        self.codec.decode(&bytes)
    }

    /// Deletes `entry`'s object, logging instead of failing.
    pub async fn remove(&self, entry: &CatalogEntry) {
        let location = self.locate(entry);
        if let Err(e) = self.objects.delete(&location.bucket, &location.path).await {
            tracing::warn!(id = %entry.id, %location, error = %e, "failed to delete backup object");
        }
    }
}

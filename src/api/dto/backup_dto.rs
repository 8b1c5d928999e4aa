//! Backup DTOs for create, list, get, and restore.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::{BackupId, BackupStatus, BackupType, CatalogEntry};

/// Request body for `POST /backups`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateBackupRequest {
    /// Trigger kind. Defaults to `manual`.
    #[serde(default)]
    pub backup_type: Option<BackupType>,
}

/// Response body for `POST /backups` (201 Created).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateBackupResponse {
    /// Id of the new backup.
    pub backup_id: BackupId,
    /// Trigger kind.
    pub backup_type: BackupType,
    /// `false` when the catalog is unprovisioned and the backup will not
    /// appear in listings.
    pub catalogued: bool,
}

/// One catalogued backup.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BackupEntryDto {
    /// Backup id.
    pub id: BackupId,
    /// Recorded object path.
    pub file_path: String,
    /// Trigger kind.
    pub backup_type: BackupType,
    /// Number of stored objects.
    pub file_count: u32,
    /// Payload size in bytes.
    pub total_size: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// End of the retention window.
    pub expires_at: DateTime<Utc>,
    /// Status as of the request; active entries past `expires_at` read as
    /// expired.
    pub status: BackupStatus,
    /// Free-form metadata.
    pub metadata: serde_json::Value,
}

impl BackupEntryDto {
    /// Converts `entry`, evaluating its status at `now`.
    #[must_use]
    pub fn from_entry(entry: CatalogEntry, now: DateTime<Utc>) -> Self {
        let status = entry.effective_status(now);
        Self {
            id: entry.id,
            file_path: entry.file_path,
            backup_type: entry.backup_type,
            file_count: entry.file_count,
            total_size: entry.total_size,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            status,
            metadata: entry.metadata,
        }
    }
}

/// Paginated list response for `GET /backups`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BackupListResponse {
    /// Entries on this page, newest first.
    pub data: Vec<BackupEntryDto>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

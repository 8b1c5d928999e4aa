//! Catalog entries: one row per stored snapshot.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{BackupId, OwnerId};

/// Default retention window for new backups.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// How a backup was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BackupType {
    /// Requested explicitly by the user.
    Manual,
    /// Created by a schedule.
    Automatic,
}

impl BackupType {
    /// Catalog column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
        }
    }
}

impl fmt::Display for BackupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "automatic" => Ok(Self::Automatic),
            other => Err(format!("unknown backup type: {other}")),
        }
    }
}

/// Lifecycle status of a catalog entry.
///
/// Transitions only `Active -> Restored` or `Active -> Expired`; both
/// targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    /// Restorable.
    Active,
    /// Restored at least once.
    Restored,
    /// Past its retention window.
    Expired,
}

impl BackupStatus {
    /// Catalog column value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Restored => "restored",
            Self::Expired => "expired",
        }
    }

    /// Returns `true` if the catalog may move from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Restored) | (Self::Active, Self::Expired)
        )
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "restored" => Ok(Self::Restored),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown backup status: {other}")),
        }
    }
}

/// Bucket and object path of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageLocation {
    /// Logical bucket name.
    pub bucket: String,
    /// Object path inside the bucket.
    pub path: String,
}

impl StorageLocation {
    /// Path as recorded in the catalog's `file_path` column.
    ///
    /// Objects in the primary bucket are recorded bare; anything else is
    /// prefixed with its bucket name so downloads know where to look.
    #[must_use]
    pub fn recorded_path(&self, primary_bucket: &str) -> String {
        if self.bucket == primary_bucket {
            self.path.clone()
        } else {
            format!("{}/{}", self.bucket, self.path)
        }
    }

    /// Inverse of [`StorageLocation::recorded_path`] for `owner`'s objects.
    ///
    /// Object paths always start with `<owner>/`, so a recorded path is
    /// read as fallback-prefixed only when what follows the bucket name
    /// still has that shape. An owner named like the fallback bucket keeps
    /// its bare primary paths.
    #[must_use]
    pub fn from_recorded(
        recorded: &str,
        owner: &OwnerId,
        primary_bucket: &str,
        fallback_bucket: &str,
    ) -> Self {
        let owner_prefix = format!("{owner}/");
        let fallback_path = recorded
            .strip_prefix(fallback_bucket)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|path| path.starts_with(&owner_prefix));
        match fallback_path {
            Some(path) => Self {
                bucket: fallback_bucket.to_string(),
                path: path.to_string(),
            },
            None => Self {
                bucket: primary_bucket.to_string(),
                path: recorded.to_string(),
            },
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bucket, self.path)
    }
}

/// A snapshot object that was written successfully and awaits cataloguing.
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Owner of the snapshot.
    pub owner_id: OwnerId,
    /// Trigger kind.
    pub backup_type: BackupType,
    /// Where the bytes landed.
    pub location: StorageLocation,
    /// Size of the serialized snapshot.
    pub size_bytes: u64,
    /// Upload timestamp; also the catalog `created_at`.
    pub stored_at: DateTime<Utc>,
    /// Free-form metadata echoed into the catalog.
    pub metadata: serde_json::Value,
}

/// One catalogued snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Opaque id.
    pub id: BackupId,
    /// Owning identity.
    pub owner_id: OwnerId,
    /// Recorded object path, prefixed with the bucket when not primary.
    pub file_path: String,
    /// Trigger kind.
    pub backup_type: BackupType,
    /// Objects making up the backup; always 1.
    pub file_count: u32,
    /// Serialized snapshot size in bytes.
    pub total_size: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// `created_at` plus the retention window.
    pub expires_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: BackupStatus,
    /// Free-form metadata, echoes the schema version.
    pub metadata: serde_json::Value,
}

impl CatalogEntry {
    /// Builds the active entry describing `object`.
    #[must_use]
    pub fn for_object(
        id: BackupId,
        object: StoredObject,
        primary_bucket: &str,
        retention: Duration,
    ) -> Self {
        Self {
            id,
            owner_id: object.owner_id,
            file_path: object.location.recorded_path(primary_bucket),
            backup_type: object.backup_type,
            file_count: 1,
            total_size: object.size_bytes,
            created_at: object.stored_at,
            expires_at: object.stored_at + retention,
            status: BackupStatus::Active,
            metadata: object.metadata,
        }
    }

    /// Status as observed at `now`: an active entry past `expires_at`
    /// reads as expired even before a sweep updates the row.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> BackupStatus {
        if self.status == BackupStatus::Active && now >= self.expires_at {
            BackupStatus::Expired
        } else {
            self.status
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn owner() -> OwnerId {
        let Some(owner) = OwnerId::parse("U1") else {
            panic!("valid owner");
        };
        owner
    }

    fn object(bucket: &str) -> StoredObject {
        StoredObject {
            owner_id: owner(),
            backup_type: BackupType::Manual,
            location: StorageLocation {
                bucket: bucket.to_string(),
                path: "U1/backup-U1-x.json".to_string(),
            },
            size_bytes: 42,
            stored_at: Utc::now(),
            metadata: serde_json::json!({"version": "1.0"}),
        }
    }

    #[test]
    fn status_transitions_only_leave_active() {
        use BackupStatus::*;
        assert!(Active.can_transition_to(Restored));
        assert!(Active.can_transition_to(Expired));
        assert!(!Restored.can_transition_to(Active));
        assert!(!Restored.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Active));
        assert!(!Expired.can_transition_to(Restored));
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn expires_at_is_created_at_plus_retention() {
        let retention = Duration::days(i64::from(DEFAULT_RETENTION_DAYS));
        let entry = CatalogEntry::for_object(BackupId::generate(), object("backups"), "backups", retention);
        assert_eq!(entry.expires_at - entry.created_at, retention);
        assert_eq!(entry.file_count, 1);
        assert_eq!(entry.status, BackupStatus::Active);
    }

    #[test]
    fn fallback_location_is_prefixed() {
        let entry = CatalogEntry::for_object(
            BackupId::generate(),
            object("attachments"),
            "backups",
            Duration::days(1),
        );
        assert_eq!(entry.file_path, "attachments/U1/backup-U1-x.json");

        let location =
            StorageLocation::from_recorded(&entry.file_path, &owner(), "backups", "attachments");
        assert_eq!(location.bucket, "attachments");
        assert_eq!(location.path, "U1/backup-U1-x.json");
    }

    #[test]
    fn primary_location_is_bare() {
        let location =
            StorageLocation::from_recorded("U1/backup-U1-x.json", &owner(), "backups", "attachments");
        assert_eq!(location.bucket, "backups");
        assert_eq!(location.path, "U1/backup-U1-x.json");
    }

    #[test]
    fn owner_named_like_fallback_bucket_is_not_misread() {
        let Some(owner) = OwnerId::parse("attachments") else {
            panic!("valid owner");
        };
        let primary = StorageLocation::from_recorded(
            "attachments/backup-attachments-x.json",
            &owner,
            "backups",
            "attachments",
        );
        assert_eq!(primary.bucket, "backups");
        assert_eq!(primary.path, "attachments/backup-attachments-x.json");

        let fallback = StorageLocation::from_recorded(
            "attachments/attachments/backup-attachments-x.json",
            &owner,
            "backups",
            "attachments",
        );
        assert_eq!(fallback.bucket, "attachments");
        assert_eq!(fallback.path, "attachments/backup-attachments-x.json");
    }

    #[test]
    fn effective_status_expires_active_entries() {
        let entry = CatalogEntry::for_object(
            BackupId::generate(),
            object("backups"),
            "backups",
            Duration::days(1),
        );
        assert_eq!(entry.effective_status(entry.created_at), BackupStatus::Active);
        assert_eq!(
            entry.effective_status(entry.expires_at),
            BackupStatus::Expired
        );
    }

    #[test]
    fn enums_parse_from_column_values() {
        assert_eq!("manual".parse::<BackupType>(), Ok(BackupType::Manual));
        assert_eq!("restored".parse::<BackupStatus>(), Ok(BackupStatus::Restored));
        assert!("weekly".parse::<BackupType>().is_err());
    }
}

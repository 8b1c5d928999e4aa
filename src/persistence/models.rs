//! Database row shapes for the backup catalog.

use chrono::{DateTime, Utc};

use super::error::CatalogError;
use crate::domain::{BackupId, CatalogEntry, OwnerId};

/// Column list selected for every catalog read, in [`CatalogRow`] order.
pub const CATALOG_COLUMNS: &str = "id, owner_id, file_path, backup_type, file_count, total_size, \
     created_at, expires_at, status, metadata";

/// A row of the `backups` catalog table.
pub type CatalogRow = (
    String,
    String,
    String,
    String,
    i32,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
    String,
    serde_json::Value,
);

/// Converts a catalog row into a [`CatalogEntry`].
///
/// # Errors
///
/// Returns [`CatalogError::Query`] if an enum column or the owner holds a
/// value this build does not recognise.
pub fn entry_from_row(row: CatalogRow) -> Result<CatalogEntry, CatalogError> {
    let (
        id,
        owner_id,
        file_path,
        backup_type,
        file_count,
        total_size,
        created_at,
        expires_at,
        status,
        metadata,
    ) = row;

    Ok(CatalogEntry {
        owner_id: OwnerId::parse(&owner_id)
            .ok_or_else(|| CatalogError::Query(format!("invalid owner_id in row {id}")))?,
        id: BackupId::from_raw(id),
        file_path,
        backup_type: backup_type.parse().map_err(CatalogError::Query)?,
        file_count: u32::try_from(file_count).unwrap_or(1),
        total_size: u64::try_from(total_size).unwrap_or(0),
        created_at,
        expires_at,
        status: status.parse().map_err(CatalogError::Query)?,
        metadata,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{BackupStatus, BackupType};

    fn row(status: &str) -> CatalogRow {
        let now = Utc::now();
        (
            "b-1".to_string(),
            "U1".to_string(),
            "U1/backup.json".to_string(),
            "automatic".to_string(),
            1,
            512,
            now,
            now + chrono::Duration::days(90),
            status.to_string(),
            serde_json::json!({"version": "1.0"}),
        )
    }

    #[test]
    fn converts_valid_rows() {
        let Ok(entry) = entry_from_row(row("restored")) else {
            panic!("row should convert");
        };
        assert_eq!(entry.backup_type, BackupType::Automatic);
        assert_eq!(entry.status, BackupStatus::Restored);
        assert_eq!(entry.total_size, 512);
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(entry_from_row(row("archived")).is_err());
    }
}

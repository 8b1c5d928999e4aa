//! Errors reported by the storage tiers.
//!
//! Each tier gets its own narrow error so components can react to the
//! conditions they degrade on (a missing table, an absent catalog) with a
//! typed match instead of inspecting driver messages.

use crate::domain::RemoteTable;

/// SQLSTATE for `undefined_table` ("relation does not exist").
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Local key-value store failure.
#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    /// Reading or writing the backing file failed.
    #[error("local store i/o on {key:?}: {reason}")]
    Io {
        /// Key being accessed, empty for whole-store operations.
        key: String,
        /// Underlying error message.
        reason: String,
    },

    /// The backing file is not a JSON object of strings.
    #[error("local store is corrupt: {0}")]
    Corrupt(String),
}

/// Remote relational table failure.
#[derive(Debug, thiserror::Error)]
pub enum RemoteStoreError {
    /// The table does not exist in the remote database.
    #[error("table {0} does not exist")]
    TableMissing(RemoteTable),

    /// Any other query failure.
    #[error("query on {table} failed: {reason}")]
    Query {
        /// Table being queried.
        table: RemoteTable,
        /// Driver error message.
        reason: String,
    },

    /// A plan lookup failed.
    #[error("subscription lookup failed: {0}")]
    PlanLookup(String),
}

/// Object store failure.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// No object at this bucket/path.
    #[error("object not found: {bucket}/{path}")]
    NotFound {
        /// Bucket name.
        bucket: String,
        /// Object path.
        path: String,
    },

    /// The bucket refused the operation or is unreachable.
    #[error("bucket {bucket} unavailable: {reason}")]
    Unavailable {
        /// Bucket name.
        bucket: String,
        /// Underlying error message.
        reason: String,
    },

    /// The path would escape its bucket.
    #[error("invalid object path: {0}")]
    InvalidPath(String),
}

/// Backup catalog failure.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog table has not been created.
    #[error("backup catalog is not provisioned")]
    Unprovisioned,

    /// Any other catalog failure.
    #[error("{0}")]
    Query(String),
}

impl CatalogError {
    /// Maps a sqlx error, recognising a missing catalog table by SQLSTATE.
    #[must_use]
    pub fn from_sqlx(err: &sqlx::Error) -> Self {
        if is_undefined_table(err) {
            Self::Unprovisioned
        } else {
            Self::Query(err.to_string())
        }
    }
}

impl RemoteStoreError {
    /// Maps a sqlx error raised while accessing `table`.
    #[must_use]
    pub fn from_sqlx(table: RemoteTable, err: &sqlx::Error) -> Self {
        if is_undefined_table(err) {
            Self::TableMissing(table)
        } else {
            Self::Query {
                table,
                reason: err.to_string(),
            }
        }
    }
}

/// Returns `true` if `err` is a Postgres "relation does not exist" error.
#[must_use]
pub fn is_undefined_table(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == PG_UNDEFINED_TABLE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_queries() {
        let err = sqlx::Error::RowNotFound;
        assert!(!is_undefined_table(&err));
        assert!(matches!(CatalogError::from_sqlx(&err), CatalogError::Query(_)));
        assert!(matches!(
            RemoteStoreError::from_sqlx(RemoteTable::Students, &err),
            RemoteStoreError::Query { .. }
        ));
    }

    #[test]
    fn messages_name_the_table() {
        let err = RemoteStoreError::TableMissing(RemoteTable::Comments);
        assert_eq!(err.to_string(), "table comments does not exist");
    }
}

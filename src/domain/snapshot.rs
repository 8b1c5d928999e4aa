//! Versioned snapshot of one identity's application state.
//!
//! A [`Snapshot`] is built once in memory, serialized once, and never
//! mutated afterwards. Its serde layout is the object-store wire format:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "timestamp": "2026-10-16T08:30:00.000000Z",
//!   "localData": { "user.theme": "dark" },
//!   "databaseData": { "students": [ { "id": "S1", "name": "Ali" } ] },
//!   "summary": {
//!     "localDataKeys": ["user.theme"],
//!     "databaseTables": ["students"],
//!     "totalLocalItems": 1,
//!     "totalDatabaseRecords": 1
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single column value in a remote row.
///
/// Closed set of scalar variants plus a `Json` escape hatch for structured
/// columns (arrays, nested objects) so rows survive schema drift between
/// application versions. Numbers keep their JSON literal (`serde_json` is
/// built with `arbitrary_precision`), so `numeric` columns and integers
/// past `i64::MAX` round-trip exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum FieldValue {
    /// SQL `NULL`.
    Null,
    /// Boolean column.
    Bool(bool),
    /// Any numeric column, kept verbatim.
    Number(serde_json::Number),
    /// Text, timestamps, UUIDs.
    Text(String),
    /// Any structured value.
    Json(serde_json::Value),
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::Text(s),
            structured => Self::Json(structured),
        }
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Self::Null,
            FieldValue::Bool(b) => Self::Bool(b),
            FieldValue::Number(n) => Self::Number(n),
            FieldValue::Text(s) => Self::String(s),
            FieldValue::Json(v) => v,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One remote row: column name to value.
pub type Row = BTreeMap<String, FieldValue>;

/// Dump of the retained local key-value namespace.
pub type LocalDataset = BTreeMap<String, String>;

/// Rows per remote table name, in query order.
pub type RemoteDataset = BTreeMap<String, Vec<Row>>;

/// Snapshot format version, serialized as `"<major>.<minor>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    major: u16,
    minor: u16,
}

impl SchemaVersion {
    /// The version written by this build and the newest one it can read.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    /// Creates a version from its parts.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Returns `true` if a snapshot of this version can be restored.
    #[must_use]
    pub fn is_supported(self) -> bool {
        self <= Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Error returned when a version string is not `"<major>.<minor>"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed schema version: {0:?}")]
pub struct MalformedVersion(pub String);

impl FromStr for SchemaVersion {
    type Err = MalformedVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(malformed)?;
        Ok(Self {
            major: major.parse().map_err(|_| malformed())?,
            minor: minor.parse().map_err(|_| malformed())?,
        })
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = MalformedVersion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.to_string()
    }
}

/// Redundant counts kept for diagnostics.
///
/// Always derivable from the datasets; readers recompute it and never
/// trust the stored copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    /// Local keys present in the snapshot.
    pub local_data_keys: Vec<String>,
    /// Remote tables present in the snapshot, including empty ones.
    pub database_tables: Vec<String>,
    /// Number of local keys.
    pub total_local_items: usize,
    /// Rows across every remote table.
    pub total_database_records: usize,
}

impl SnapshotSummary {
    /// Computes the summary of the given datasets.
    #[must_use]
    pub fn compute(local: &LocalDataset, remote: &RemoteDataset) -> Self {
        Self {
            local_data_keys: local.keys().cloned().collect(),
            database_tables: remote.keys().cloned().collect(),
            total_local_items: local.len(),
            total_database_records: remote.values().map(Vec::len).sum(),
        }
    }
}

/// Point-in-time copy of an identity's local and remote state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version.
    #[serde(rename = "version")]
    pub schema_version: SchemaVersion,
    /// When the snapshot was built.
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Retained local key-value pairs.
    #[serde(rename = "localData", default)]
    pub local_data: LocalDataset,
    /// Owner-scoped rows per remote table.
    #[serde(rename = "databaseData", default)]
    pub database_data: RemoteDataset,
    /// Diagnostic counts.
    #[serde(default)]
    pub summary: SnapshotSummary,
}

impl Snapshot {
    /// Returns a copy of this snapshot whose summary is recomputed from the
    /// datasets.
    #[must_use]
    pub fn with_recomputed_summary(mut self) -> Self {
        self.summary = SnapshotSummary::compute(&self.local_data, &self.database_data);
        self
    }
}

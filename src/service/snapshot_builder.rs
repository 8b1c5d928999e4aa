//! Snapshot assembly and the pluggable wire codec.

use chrono::Utc;

use crate::domain::{LocalDataset, RemoteDataset, SchemaVersion, Snapshot, SnapshotSummary};
use crate::error::BackupError;

/// Combines collected datasets into a [`Snapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Stamps the current schema version and time and computes the summary.
    #[must_use]
    pub fn build(&self, local: LocalDataset, remote: RemoteDataset) -> Snapshot {
        Snapshot {
            schema_version: SchemaVersion::CURRENT,
            created_at: Utc::now(),
            summary: SnapshotSummary::compute(&local, &remote),
            local_data: local,
            database_data: remote,
        }
    }
}

/// Serialization of snapshots to and from object-store payloads.
pub trait SnapshotCodec: Send + Sync + std::fmt::Debug {
    /// Encodes `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Serialization`] if encoding fails.
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, BackupError>;

    /// Decodes a payload, rejecting versions newer than
    /// [`SchemaVersion::CURRENT`] before reading any data.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SchemaVersionUnsupported`] for unknown
    /// versions and [`BackupError::MalformedSnapshot`] for invalid payloads.
    fn decode(&self, bytes: &[u8]) -> Result<Snapshot, BackupError>;
}

/// JSON codec producing the documented wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSnapshotCodec;

/// Just enough of the payload to check the version.
#[derive(serde::Deserialize)]
struct VersionProbe {
    version: Option<serde_json::Value>,
}

impl SnapshotCodec for JsonSnapshotCodec {
    fn encode(&self, snapshot: &Snapshot) -> Result<Vec<u8>, BackupError> {
        serde_json::to_vec(snapshot).map_err(|e| BackupError::Serialization(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Snapshot, BackupError> {
        let probe: VersionProbe = serde_json::from_slice(bytes)
            .map_err(|e| BackupError::MalformedSnapshot(e.to_string()))?;
        let raw = match probe.version {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => return Err(BackupError::MalformedSnapshot("missing version".to_string())),
        };
        let unsupported = || BackupError::SchemaVersionUnsupported {
            found: raw.clone(),
            supported: SchemaVersion::CURRENT.to_string(),
        };
        let version: SchemaVersion = raw.parse().map_err(|_| unsupported())?;
        if !version.is_supported() {
            return Err(unsupported());
        }

        let snapshot: Snapshot = serde_json::from_slice(bytes)
            .map_err(|e| BackupError::MalformedSnapshot(e.to_string()))?;
        let recomputed = snapshot.with_recomputed_summary();
        Ok(recomputed)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{FieldValue, Row};

    fn sample() -> Snapshot {
        let mut local = LocalDataset::new();
        local.insert("user.theme".to_string(), "dark".to_string());
        let mut remote = RemoteDataset::new();
        remote.insert(
            "students".to_string(),
            vec![Row::from([
                ("id".to_string(), FieldValue::from("S1")),
                ("name".to_string(), FieldValue::from("Ali")),
            ])],
        );
        SnapshotBuilder.build(local, remote)
    }

    #[test]
    fn build_stamps_version_and_summary() {
        let snapshot = sample();
        assert_eq!(snapshot.schema_version, SchemaVersion::CURRENT);
        assert_eq!(snapshot.summary.total_local_items, 1);
        assert_eq!(snapshot.summary.total_database_records, 1);
    }

    #[test]
    fn json_codec_preserves_data() {
        let snapshot = sample();
        let Ok(bytes) = JsonSnapshotCodec.encode(&snapshot) else {
            panic!("encode failed");
        };
        let Ok(decoded) = JsonSnapshotCodec.decode(&bytes) else {
            panic!("decode failed");
        };
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn future_version_fails_closed() {
        let payload = br#"{"version":"2.0","timestamp":"2026-01-01T00:00:00Z","localData":{"k":1}}"#;
        let result = JsonSnapshotCodec.decode(payload);
        assert!(matches!(
            result,
            Err(BackupError::SchemaVersionUnsupported { ref found, .. }) if found == "2.0"
        ));
    }

    #[test]
    fn garbage_version_is_unsupported() {
        let payload = br#"{"version":"banana","timestamp":"2026-01-01T00:00:00Z"}"#;
        assert!(matches!(
            JsonSnapshotCodec.decode(payload),
            Err(BackupError::SchemaVersionUnsupported { .. })
        ));
    }

    #[test]
    fn stored_summary_is_not_trusted() {
        let payload = br#"{
            "version": "1.0",
            "timestamp": "2026-01-01T00:00:00Z",
            "localData": {"user.a": "1", "user.b": "2"},
            "databaseData": {},
            "summary": {"localDataKeys": [], "databaseTables": [], "totalLocalItems": 99, "totalDatabaseRecords": 7}
        }"#;
        let Ok(decoded) = JsonSnapshotCodec.decode(payload) else {
            panic!("decode failed");
        };
        assert_eq!(decoded.summary.total_local_items, 2);
        assert_eq!(decoded.summary.total_database_records, 0);
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            JsonSnapshotCodec.decode(b"not json"),
            Err(BackupError::MalformedSnapshot(_))
        ));
    }
}

//! Opaque backup identifier.
//!
//! Catalogued backups get a UUID v4. When the catalog is unprovisioned the
//! uploader synthesizes an id from the owner and upload timestamp instead,
//! which is why the id is kept as an opaque string rather than a UUID.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OwnerId;

/// Prefix marking ids that were synthesized without a catalog row.
const SYNTHESIZED_PREFIX: &str = "local-";

/// Globally unique, opaque identifier of a backup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct BackupId(String);

impl BackupId {
    /// Generates a new random id (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Builds an id for a backup that has no catalog row.
    ///
    /// `stamp` is the same path-safe timestamp used in the object path, so
    /// the id stays unique per owner without a separate round trip.
    #[must_use]
    pub fn synthesized(owner: &OwnerId, stamp: &str) -> Self {
        Self(format!("{SYNTHESIZED_PREFIX}{owner}-{stamp}"))
    }

    /// Wraps an id received from a caller or read from the catalog.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns `true` if this id was synthesized without a catalog row.
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.0.starts_with(SYNTHESIZED_PREFIX)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_uuids() {
        let a = BackupId::generate();
        let b = BackupId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().parse::<uuid::Uuid>().is_ok());
        assert!(!a.is_synthesized());
    }

    #[test]
    fn synthesized_id_embeds_owner_and_stamp() {
        let Some(owner) = OwnerId::parse("U1") else {
            panic!("valid owner");
        };
        let id = BackupId::synthesized(&owner, "2026-01-02T03-04-05-000000Z");
        assert_eq!(id.as_str(), "local-U1-2026-01-02T03-04-05-000000Z");
        assert!(id.is_synthesized());
    }
}

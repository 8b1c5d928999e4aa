//! Type-safe owner identity.
//!
//! [`OwnerId`] is a newtype around the authenticated user's identifier so
//! that identities cannot be confused with backup ids, table names, or
//! object paths.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity that owns local data, remote rows, and catalog entries.
///
/// Always non-empty and free of surrounding whitespace. Injected into a
/// [`crate::service::BackupOrchestrator`] at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Parses an owner identity, trimming whitespace.
    ///
    /// Returns `None` for empty input or input containing a `/`, which
    /// would break the object path layout.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.contains('/') {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_whitespace() {
        let Some(id) = OwnerId::parse("  U1 ") else {
            panic!("expected valid owner id");
        };
        assert_eq!(id.as_str(), "U1");
    }

    #[test]
    fn parse_rejects_empty_and_slash() {
        assert!(OwnerId::parse("").is_none());
        assert!(OwnerId::parse("   ").is_none());
        assert!(OwnerId::parse("a/b").is_none());
    }

    #[test]
    fn display_matches_inner() {
        let Some(id) = OwnerId::parse("teacher-42") else {
            panic!("expected valid owner id");
        };
        assert_eq!(format!("{id}"), "teacher-42");
    }

    #[test]
    fn serializes_transparently() {
        let Some(id) = OwnerId::parse("U1") else {
            panic!("expected valid owner id");
        };
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"U1\"");
    }
}

//! The fixed set of remote application tables covered by a backup.

use std::fmt;

/// Remote table whose owner-scoped rows are collected and restored.
///
/// The list is a hard-coded constant: adding a table to the application
/// requires adding a variant here and to [`RemoteTable::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemoteTable {
    /// Student records.
    Students,
    /// Performance reports.
    Reports,
    /// Free-text comments.
    Comments,
    /// Generic file-attachment records.
    Files,
}

impl RemoteTable {
    /// Every table, in collection and restore order.
    pub const ALL: [Self; 4] = [Self::Students, Self::Reports, Self::Comments, Self::Files];

    /// SQL table name, also used as the key in the snapshot's `databaseData`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Reports => "reports",
            Self::Comments => "comments",
            Self::Files => "files",
        }
    }

    /// Column holding the owning identity.
    #[must_use]
    pub const fn owner_column(self) -> &'static str {
        "user_id"
    }

    /// Looks a table up by its SQL name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.name() == name)
    }
}

impl fmt::Display for RemoteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for table in RemoteTable::ALL {
            assert_eq!(RemoteTable::from_name(table.name()), Some(table));
        }
        assert_eq!(RemoteTable::from_name("grades"), None);
    }

    #[test]
    fn fixed_list_has_four_tables() {
        assert_eq!(RemoteTable::ALL.len(), 4);
    }
}

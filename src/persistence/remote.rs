//! Remote relational tables holding owner-scoped application rows.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::RemoteStoreError;
use crate::domain::{OwnerId, RemoteTable, Row};

/// Owner-scoped access to the fixed application tables.
#[async_trait]
pub trait RemoteTables: Send + Sync + std::fmt::Debug {
    /// Returns every row of `table` owned by `owner`.
    async fn fetch_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
    ) -> Result<Vec<Row>, RemoteStoreError>;

    /// Deletes every row of `table` owned by `owner`, returning the count.
    async fn delete_owned(&self, table: RemoteTable, owner: &OwnerId)
    -> Result<u64, RemoteStoreError>;

    /// Inserts `rows` into `table` on behalf of `owner`, returning the count.
    async fn insert_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
        rows: &[Row],
    ) -> Result<u64, RemoteStoreError>;

    /// Replaces `owner`'s rows in `table` with `rows`.
    ///
    /// The default deletes then inserts, skipping the insert when `rows` is
    /// empty. Backends with transactions override this to make the swap
    /// atomic per table.
    async fn replace_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
        rows: &[Row],
    ) -> Result<(), RemoteStoreError> {
        self.delete_owned(table, owner).await?;
        if !rows.is_empty() {
            self.insert_owned(table, owner, rows).await?;
        }
        Ok(())
    }
}

/// In-memory [`RemoteTables`] keyed by table and owner.
///
/// Tables can be marked missing (behaves like an unprovisioned relation)
/// or failing (every query errors) to exercise degradation paths.
#[derive(Debug, Default)]
pub struct MemoryRemoteTables {
    rows: RwLock<HashMap<(RemoteTable, OwnerId), Vec<Row>>>,
    missing: HashSet<RemoteTable>,
    failing: HashSet<RemoteTable>,
}

impl MemoryRemoteTables {
    /// Creates empty tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `table` behave as if it did not exist.
    #[must_use]
    pub fn with_missing_table(mut self, table: RemoteTable) -> Self {
        self.missing.insert(table);
        self
    }

    /// Makes every query on `table` fail.
    #[must_use]
    pub fn with_failing_table(mut self, table: RemoteTable) -> Self {
        self.failing.insert(table);
        self
    }

    /// Seeds `owner`'s rows in `table`, bypassing failure injection.
    pub async fn seed(&self, table: RemoteTable, owner: &OwnerId, rows: Vec<Row>) {
        self.rows.write().await.insert((table, owner.clone()), rows);
    }

    /// Returns `owner`'s rows in `table`, bypassing failure injection.
    pub async fn rows(&self, table: RemoteTable, owner: &OwnerId) -> Vec<Row> {
        self.rows
            .read()
            .await
            .get(&(table, owner.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn check(&self, table: RemoteTable) -> Result<(), RemoteStoreError> {
        if self.missing.contains(&table) {
            return Err(RemoteStoreError::TableMissing(table));
        }
        if self.failing.contains(&table) {
            return Err(RemoteStoreError::Query {
                table,
                reason: "injected query failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTables for MemoryRemoteTables {
    async fn fetch_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
    ) -> Result<Vec<Row>, RemoteStoreError> {
        self.check(table)?;
        Ok(self.rows(table, owner).await)
    }

    async fn delete_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
    ) -> Result<u64, RemoteStoreError> {
        self.check(table)?;
        let removed = self.rows.write().await.remove(&(table, owner.clone()));
        Ok(removed.map_or(0, |rows| u64::try_from(rows.len()).unwrap_or(u64::MAX)))
    }

    async fn insert_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
        rows: &[Row],
    ) -> Result<u64, RemoteStoreError> {
        self.check(table)?;
        self.rows
            .write()
            .await
            .entry((table, owner.clone()))
            .or_default()
            .extend(rows.iter().cloned());
        Ok(u64::try_from(rows.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::FieldValue;

    fn owner(id: &str) -> OwnerId {
        let Some(owner) = OwnerId::parse(id) else {
            panic!("valid owner");
        };
        owner
    }

    fn student(id: &str) -> Row {
        Row::from([("id".to_string(), FieldValue::from(id))])
    }

    #[tokio::test]
    async fn rows_are_scoped_by_owner() {
        let tables = MemoryRemoteTables::new();
        tables.seed(RemoteTable::Students, &owner("U1"), vec![student("S1")]).await;
        tables.seed(RemoteTable::Students, &owner("U2"), vec![student("S2")]).await;

        let rows = tables
            .fetch_owned(RemoteTable::Students, &owner("U1"))
            .await
            .unwrap_or_default();
        assert_eq!(rows, vec![student("S1")]);
    }

    #[tokio::test]
    async fn replace_swaps_rows_and_keeps_other_owners() {
        let tables = MemoryRemoteTables::new();
        tables.seed(RemoteTable::Students, &owner("U1"), vec![student("old")]).await;
        tables.seed(RemoteTable::Students, &owner("U2"), vec![student("S2")]).await;

        let result = tables
            .replace_owned(RemoteTable::Students, &owner("U1"), &[student("new")])
            .await;
        assert!(result.is_ok());
        assert_eq!(tables.rows(RemoteTable::Students, &owner("U1")).await, vec![student("new")]);
        assert_eq!(tables.rows(RemoteTable::Students, &owner("U2")).await, vec![student("S2")]);
    }

    #[tokio::test]
    async fn replace_with_empty_clears_rows() {
        let tables = MemoryRemoteTables::new();
        tables.seed(RemoteTable::Reports, &owner("U1"), vec![student("R1")]).await;
        assert!(tables.replace_owned(RemoteTable::Reports, &owner("U1"), &[]).await.is_ok());
        assert!(tables.rows(RemoteTable::Reports, &owner("U1")).await.is_empty());
    }

    #[tokio::test]
    async fn injected_failures_surface_typed_errors() {
        let tables = MemoryRemoteTables::new()
            .with_missing_table(RemoteTable::Files)
            .with_failing_table(RemoteTable::Comments);
        assert!(matches!(
            tables.fetch_owned(RemoteTable::Files, &owner("U1")).await,
            Err(RemoteStoreError::TableMissing(RemoteTable::Files))
        ));
        assert!(matches!(
            tables.fetch_owned(RemoteTable::Comments, &owner("U1")).await,
            Err(RemoteStoreError::Query { .. })
        ));
    }

    #[tokio::test]
    async fn writes_report_affected_row_counts() {
        let tables = MemoryRemoteTables::new();
        let inserted = tables
            .insert_owned(RemoteTable::Students, &owner("U1"), &[student("S1"), student("S2")])
            .await;
        assert!(matches!(inserted, Ok(2)));
        assert!(matches!(tables.delete_owned(RemoteTable::Students, &owner("U1")).await, Ok(2)));
        assert!(matches!(tables.delete_owned(RemoteTable::Students, &owner("U1")).await, Ok(0)));
    }
}

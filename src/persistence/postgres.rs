//! PostgreSQL implementations of the remote tiers.
//!
//! Table names interpolated into SQL always come from [`RemoteTable`] or
//! constants, never from callers.

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};

use super::catalog::CatalogStore;
use super::error::{CatalogError, RemoteStoreError};
use super::models::{CATALOG_COLUMNS, CatalogRow, entry_from_row};
use super::plans::{PlanLookup, SubscriptionPlan};
use super::remote::RemoteTables;
use crate::domain::{BackupId, BackupStatus, CatalogEntry, FieldValue, OwnerId, RemoteTable, Row};

/// Owner-scoped application tables backed by `sqlx::PgPool`.
///
/// Rows travel as JSON: reads use `to_jsonb(t)` and inserts use
/// `jsonb_populate_recordset`, so the crate needs no per-table structs.
#[derive(Debug, Clone)]
pub struct PostgresTables {
    pool: PgPool,
}

impl PostgresTables {
    /// Creates the backend with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn delete_rows<'e>(
    exec: impl PgExecutor<'e>,
    table: RemoteTable,
    owner: &OwnerId,
) -> Result<u64, RemoteStoreError> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = $1",
        table.name(),
        table.owner_column()
    );
    let result = sqlx::query(&sql)
        .bind(owner.as_str())
        .execute(exec)
        .await
        .map_err(|e| RemoteStoreError::from_sqlx(table, &e))?;
    Ok(result.rows_affected())
}

async fn insert_rows<'e>(
    exec: impl PgExecutor<'e>,
    table: RemoteTable,
    owner: &OwnerId,
    rows: &[Row],
) -> Result<u64, RemoteStoreError> {
    // Restored rows always belong to the restoring identity.
    let owned: Vec<Row> = rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.insert(
                table.owner_column().to_string(),
                FieldValue::Text(owner.as_str().to_string()),
            );
            row
        })
        .collect();
    let payload = serde_json::to_value(&owned).map_err(|e| RemoteStoreError::Query {
        table,
        reason: e.to_string(),
    })?;

    let name = table.name();
    let sql = format!("INSERT INTO {name} SELECT * FROM jsonb_populate_recordset(NULL::{name}, $1)");
    let result = sqlx::query(&sql)
        .bind(payload)
        .execute(exec)
        .await
        .map_err(|e| RemoteStoreError::from_sqlx(table, &e))?;
    Ok(result.rows_affected())
}

#[async_trait]
impl RemoteTables for PostgresTables {
    async fn fetch_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
    ) -> Result<Vec<Row>, RemoteStoreError> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE t.{} = $1",
            table.name(),
            table.owner_column()
        );
        let values = sqlx::query_scalar::<_, serde_json::Value>(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RemoteStoreError::from_sqlx(table, &e))?;

        values
            .into_iter()
            .map(|value| {
                serde_json::from_value::<Row>(value).map_err(|e| RemoteStoreError::Query {
                    table,
                    reason: format!("row is not a JSON object: {e}"),
                })
            })
            .collect()
    }

    async fn delete_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
    ) -> Result<u64, RemoteStoreError> {
        delete_rows(&self.pool, table, owner).await
    }

    async fn insert_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
        rows: &[Row],
    ) -> Result<u64, RemoteStoreError> {
        insert_rows(&self.pool, table, owner, rows).await
    }

    async fn replace_owned(
        &self,
        table: RemoteTable,
        owner: &OwnerId,
        rows: &[Row],
    ) -> Result<(), RemoteStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RemoteStoreError::from_sqlx(table, &e))?;
        delete_rows(&mut *tx, table, owner).await?;
        if !rows.is_empty() {
            insert_rows(&mut *tx, table, owner, rows).await?;
        }
        tx.commit()
            .await
            .map_err(|e| RemoteStoreError::from_sqlx(table, &e))
    }
}

/// Backup catalog stored in the `backups` table.
#[derive(Debug, Clone)]
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    /// Creates the catalog with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn probe(&self) -> Result<(), CatalogError> {
        sqlx::query("SELECT 1 FROM backups LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(&e))?;
        Ok(())
    }

    async fn insert(&self, entry: &CatalogEntry) -> Result<CatalogEntry, CatalogError> {
        let sql = format!(
            "INSERT INTO backups ({CATALOG_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {CATALOG_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CatalogRow>(&sql)
            .bind(entry.id.as_str())
            .bind(entry.owner_id.as_str())
            .bind(&entry.file_path)
            .bind(entry.backup_type.as_str())
            .bind(i32::try_from(entry.file_count).unwrap_or(i32::MAX))
            .bind(i64::try_from(entry.total_size).unwrap_or(i64::MAX))
            .bind(entry.created_at)
            .bind(entry.expires_at)
            .bind(entry.status.as_str())
            .bind(&entry.metadata)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(&e))?;
        entry_from_row(row)
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<CatalogEntry>, CatalogError> {
        let sql = format!(
            "SELECT {CATALOG_COLUMNS} FROM backups WHERE owner_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, CatalogRow>(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(&e))?;
        rows.into_iter().map(entry_from_row).collect()
    }

    async fn get(
        &self,
        id: &BackupId,
        owner: &OwnerId,
    ) -> Result<Option<CatalogEntry>, CatalogError> {
        let sql =
            format!("SELECT {CATALOG_COLUMNS} FROM backups WHERE id = $1 AND owner_id = $2");
        let row = sqlx::query_as::<_, CatalogRow>(&sql)
            .bind(id.as_str())
            .bind(owner.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(&e))?;
        row.map(entry_from_row).transpose()
    }

    async fn delete(&self, id: &BackupId, owner: &OwnerId) -> Result<bool, CatalogError> {
        let result = sqlx::query("DELETE FROM backups WHERE id = $1 AND owner_id = $2")
            .bind(id.as_str())
            .bind(owner.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::from_sqlx(&e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(
        &self,
        id: &BackupId,
        owner: &OwnerId,
        status: BackupStatus,
    ) -> Result<bool, CatalogError> {
        if !BackupStatus::Active.can_transition_to(status) {
            return Ok(false);
        }
        let result = sqlx::query(
            "UPDATE backups SET status = $3 WHERE id = $1 AND owner_id = $2 AND status = 'active'",
        )
        .bind(id.as_str())
        .bind(owner.as_str())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| CatalogError::from_sqlx(&e))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Subscription plans read from the `subscriptions` table.
#[derive(Debug, Clone)]
pub struct PostgresPlanLookup {
    pool: PgPool,
}

impl PostgresPlanLookup {
    /// Creates the lookup with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanLookup for PostgresPlanLookup {
    async fn active_plan(
        &self,
        owner: &OwnerId,
    ) -> Result<Option<SubscriptionPlan>, RemoteStoreError> {
        let tier = sqlx::query_scalar::<_, String>(
            "SELECT plan_type FROM subscriptions WHERE user_id = $1 AND status = 'active' \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(owner.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RemoteStoreError::PlanLookup(e.to_string()))?;
        Ok(tier.map(SubscriptionPlan::new))
    }
}

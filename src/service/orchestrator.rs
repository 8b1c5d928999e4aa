//! Per-identity orchestration of backup and restore runs.
//!
//! [`BackupOrchestrator`] drives each run through its [`Stage`]s. Before a
//! stage starts the cancellation token is checked and, for stages with a
//! progress step, a [`ProgressEvent`] is handed to the caller. The first
//! failing stage ends the run with an error naming that stage.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    BackupId, BackupStatus, BackupType, CatalogEntry, DEFAULT_RETENTION_DAYS, Locale, Operation,
    OwnerId, ProgressEvent, Stage,
};
use crate::error::BackupError;
use crate::persistence::{
    CatalogStore, LocalStoreProvider, ObjectStore, PlanLookup, ProvisioningState, RemoteTables,
    probe_provisioning,
};

use super::cancellation::CancellationToken;
use super::catalog_recorder::CatalogRecorder;
use super::collector::{DEFAULT_RETAINED_PREFIXES, LocalDataCollector, RemoteDataCollector};
use super::downloader::SnapshotDownloader;
use super::permission::{BackupPolicy, PaidTierPolicy, PermissionGate};
use super::restorer::{LocalRestorer, RemoteRestorer};
use super::snapshot_builder::{JsonSnapshotCodec, SnapshotBuilder, SnapshotCodec};
use super::uploader::ObjectStoreUploader;

/// Tunables shared by every orchestrator.
#[derive(Debug, Clone)]
pub struct BackupSettings {
    /// Bucket tried first on upload.
    pub primary_bucket: String,
    /// Bucket used when the primary write fails.
    pub fallback_bucket: String,
    /// Days a backup stays restorable.
    pub retention_days: u32,
    /// Local key prefixes included in snapshots.
    pub retained_prefixes: Vec<String>,
    /// Language of progress messages.
    pub locale: Locale,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            primary_bucket: "backups".to_string(),
            fallback_bucket: "attachments".to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
            retained_prefixes: DEFAULT_RETAINED_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
            locale: Locale::default(),
        }
    }
}

/// Storage backends and policies an orchestrator is built from.
#[derive(Debug, Clone)]
pub struct BackupDeps {
    /// Per-identity local key-value stores.
    pub local: Arc<dyn LocalStoreProvider>,
    /// Remote application tables.
    pub remote: Arc<dyn RemoteTables>,
    /// Object storage for snapshot payloads.
    pub objects: Arc<dyn ObjectStore>,
    /// Backup catalog.
    pub catalog: Arc<dyn CatalogStore>,
    /// Subscription lookup for the permission gate.
    pub plans: Arc<dyn PlanLookup>,
    /// Decides which plans may back up.
    pub policy: Arc<dyn BackupPolicy>,
    /// Snapshot wire codec.
    pub codec: Arc<dyn SnapshotCodec>,
    /// Tunables.
    pub settings: BackupSettings,
}

impl BackupDeps {
    /// Bundles the storage backends with the default policy, JSON codec
    /// and settings.
    #[must_use]
    pub fn new(
        local: Arc<dyn LocalStoreProvider>,
        remote: Arc<dyn RemoteTables>,
        objects: Arc<dyn ObjectStore>,
        catalog: Arc<dyn CatalogStore>,
        plans: Arc<dyn PlanLookup>,
    ) -> Self {
        Self {
            local,
            remote,
            objects,
            catalog,
            plans,
            policy: Arc::new(PaidTierPolicy),
            codec: Arc::new(JsonSnapshotCodec),
            settings: BackupSettings::default(),
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: BackupSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the permission policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn BackupPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the snapshot codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn SnapshotCodec>) -> Self {
        self.codec = codec;
        self
    }
}

/// Tracks one run's stage transitions.
struct StageTracker<'a, F> {
    owner: &'a OwnerId,
    operation: Operation,
    locale: Locale,
    cancel: &'a CancellationToken,
    on_progress: F,
}

impl<F: FnMut(ProgressEvent)> StageTracker<'_, F> {
    fn enter(&mut self, stage: Stage) -> Result<(), BackupError> {
        if self.cancel.is_cancelled() {
            tracing::info!(owner = %self.owner, operation = %self.operation, %stage, "run cancelled");
            return Err(BackupError::Cancelled { stage });
        }
        tracing::debug!(owner = %self.owner, operation = %self.operation, %stage, "entering stage");
        self.report(stage);
        Ok(())
    }

    fn finish(&mut self) {
        self.report(Stage::Done);
    }

    fn report(&mut self, stage: Stage) {
        if let Some(event) = ProgressEvent::for_stage(self.operation, stage, self.locale) {
            (self.on_progress)(event);
        }
    }
}

/// Coordinates backup and restore for a single identity.
///
/// At most one backup and one restore run at a time per orchestrator; a
/// second concurrent call of the same kind fails with
/// [`BackupError::Busy`].
#[derive(Debug)]
pub struct BackupOrchestrator {
    owner: OwnerId,
    locale: Locale,
    permission: PermissionGate,
    local_collector: LocalDataCollector,
    remote_collector: RemoteDataCollector,
    builder: SnapshotBuilder,
    codec: Arc<dyn SnapshotCodec>,
    uploader: ObjectStoreUploader,
    catalog: CatalogRecorder,
    downloader: SnapshotDownloader,
    local_restorer: LocalRestorer,
    remote_restorer: RemoteRestorer,
    backup_lock: Mutex<()>,
    restore_lock: Mutex<()>,
}

impl BackupOrchestrator {
    /// Probes the catalog and builds an orchestrator for `owner`.
    pub async fn connect(owner: OwnerId, deps: &BackupDeps) -> Self {
        let provisioning = probe_provisioning(deps.catalog.as_ref()).await;
        Self::with_provisioning(owner, deps, provisioning)
    }

    /// Builds an orchestrator with a known catalog provisioning state.
    #[must_use]
    pub fn with_provisioning(
        owner: OwnerId,
        deps: &BackupDeps,
        provisioning: ProvisioningState,
    ) -> Self {
        let settings = &deps.settings;
        let retention = Duration::days(i64::from(settings.retention_days));
        let local = deps.local.store_for(&owner);
        Self {
            owner,
            locale: settings.locale,
            permission: PermissionGate::new(Arc::clone(&deps.plans), Arc::clone(&deps.policy)),
            local_collector: LocalDataCollector::new(
                Arc::clone(&local),
                settings.retained_prefixes.clone(),
            ),
            remote_collector: RemoteDataCollector::new(Arc::clone(&deps.remote)),
            builder: SnapshotBuilder,
            codec: Arc::clone(&deps.codec),
            uploader: ObjectStoreUploader::new(
                Arc::clone(&deps.objects),
                Arc::clone(&deps.catalog),
                settings.primary_bucket.clone(),
                settings.fallback_bucket.clone(),
                retention,
            ),
            catalog: CatalogRecorder::new(Arc::clone(&deps.catalog), provisioning),
            downloader: SnapshotDownloader::new(
                Arc::clone(&deps.objects),
                Arc::clone(&deps.codec),
                settings.primary_bucket.clone(),
                settings.fallback_bucket.clone(),
            ),
            local_restorer: LocalRestorer::new(local),
            remote_restorer: RemoteRestorer::new(Arc::clone(&deps.remote)),
            backup_lock: Mutex::new(()),
            restore_lock: Mutex::new(()),
        }
    }

    /// Identity this orchestrator acts for.
    #[must_use]
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Last known catalog provisioning state. An unprovisioned catalog is
    /// re-probed before every catalog use.
    #[must_use]
    pub fn provisioning(&self) -> ProvisioningState {
        self.catalog.provisioning()
    }

    /// Snapshots local and remote state and uploads it.
    ///
    /// Progress is reported at 25, 50, 75 and 100 percent. Returns the new
    /// backup's id, which is synthesized when the catalog is unprovisioned.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Busy`] if a backup is already running,
    /// [`BackupError::Cancelled`] if `cancel` fired between stages, and
    /// otherwise the failing stage wrapped in [`BackupError::StageFailed`]
    /// (permission denied, storage or catalog write failures).
    pub async fn create_backup(
        &self,
        backup_type: BackupType,
        on_progress: impl FnMut(ProgressEvent) + Send,
        cancel: &CancellationToken,
    ) -> Result<BackupId, BackupError> {
        let _guard = self
            .backup_lock
            .try_lock()
            .map_err(|_| BackupError::Busy(Operation::Backup))?;
        let mut tracker = StageTracker {
            owner: &self.owner,
            operation: Operation::Backup,
            locale: self.locale,
            cancel,
            on_progress,
        };

        tracker.enter(Stage::CheckingPermission)?;
        if !self.permission.can_backup(&self.owner).await {
            return Err(BackupError::PermissionDenied(self.owner.clone()).at(Stage::CheckingPermission));
        }

        tracker.enter(Stage::CollectingLocal)?;
        let local = self.local_collector.collect().await;

        tracker.enter(Stage::CollectingRemote)?;
        let remote = self.remote_collector.collect(&self.owner).await;

        tracker.enter(Stage::Serializing)?;
        let snapshot = self.builder.build(local, remote);
        let bytes = self
            .codec
            .encode(&snapshot)
            .map_err(|e| e.at(Stage::Serializing))?;
        let metadata = serde_json::json!({
            "version": snapshot.schema_version.to_string(),
            "summary": snapshot.summary,
        });

        tracker.enter(Stage::Uploading)?;
        let provisioning = self.catalog.refresh_provisioning().await;
        let receipt = self
            .uploader
            .upload(&bytes, &self.owner, backup_type, provisioning, metadata)
            .await
            .map_err(|e| e.at(Stage::Uploading))?;

        tracker.finish();
        tracing::info!(
            owner = %self.owner,
            id = %receipt.id,
            %backup_type,
            local_items = snapshot.summary.total_local_items,
            records = snapshot.summary.total_database_records,
            "backup created"
        );
        Ok(receipt.id)
    }

    /// Replaces local and remote state with the contents of backup `id`.
    ///
    /// Restore is destructive: the local store is cleared entirely and
    /// each remote table loses every row the identity owns before the
    /// snapshot's rows are written. On success the catalog entry is
    /// marked restored.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Busy`] if a restore is already running,
    /// [`BackupError::Cancelled`] if `cancel` fired between stages, and
    /// otherwise the failing stage wrapped in [`BackupError::StageFailed`]
    /// (not found, expired, unsupported version, storage or table write
    /// failures). See [`BackupError::leaves_mixed_state`] for failures
    /// after the local store was overwritten.
    pub async fn restore_backup(
        &self,
        id: &BackupId,
        on_progress: impl FnMut(ProgressEvent) + Send,
        cancel: &CancellationToken,
    ) -> Result<(), BackupError> {
        let _guard = self
            .restore_lock
            .try_lock()
            .map_err(|_| BackupError::Busy(Operation::Restore))?;
        let mut tracker = StageTracker {
            owner: &self.owner,
            operation: Operation::Restore,
            locale: self.locale,
            cancel,
            on_progress,
        };

        tracker.enter(Stage::Downloading)?;
        let entry = self
            .catalog
            .get(id, &self.owner)
            .await
            .map_err(|e| e.at(Stage::Downloading))?;
        if entry.effective_status(Utc::now()) == BackupStatus::Expired {
            return Err(BackupError::BackupExpired(id.clone()).at(Stage::Downloading));
        }
        let snapshot = self
            .downloader
            .download(&entry)
            .await
            .map_err(|e| e.at(Stage::Downloading))?;

        tracker.enter(Stage::RestoringLocal)?;
        self.local_restorer
            .restore(&snapshot.local_data)
            .await
            .map_err(|e| e.at(Stage::RestoringLocal))?;

        tracker.enter(Stage::RestoringRemote)?;
        if let Err(e) = self
            .remote_restorer
            .restore(&self.owner, &snapshot.database_data)
            .await
        {
            tracing::error!(owner = %self.owner, %id, error = %e, "remote restore failed after local data was overwritten");
            return Err(e.at(Stage::RestoringRemote));
        }

        self.catalog.mark(id, &self.owner, BackupStatus::Restored).await;
        tracker.finish();
        tracing::info!(owner = %self.owner, %id, "backup restored");
        Ok(())
    }

    /// Lists this identity's catalogued backups, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::CatalogReadFailure`] if the catalog query
    /// fails for a reason other than being unprovisioned.
    pub async fn list_backups(&self) -> Result<Vec<CatalogEntry>, BackupError> {
        self.catalog.list(&self.owner).await
    }

    /// Returns one catalogued backup.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] if the identity owns no such backup.
    pub async fn get_backup(&self, id: &BackupId) -> Result<CatalogEntry, BackupError> {
        self.catalog.get(id, &self.owner).await
    }

    /// Deletes a backup's object and catalog entry. Object removal is
    /// best-effort; the catalog entry decides success.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] if the identity owns no such backup.
    pub async fn delete_backup(&self, id: &BackupId) -> Result<(), BackupError> {
        let entry = self.catalog.get(id, &self.owner).await?;
        self.downloader.remove(&entry).await;
        if !self.catalog.delete(id, &self.owner).await? {
            return Err(BackupError::NotFound(id.clone()));
        }
        tracing::info!(owner = %self.owner, %id, "backup deleted");
        Ok(())
    }
}

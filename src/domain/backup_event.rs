//! Domain events describing backup and restore runs.
//!
//! The HTTP layer republishes every [`super::ProgressEvent`] as a
//! [`BackupEvent`] through the [`super::EventBus`] so WebSocket clients can
//! follow long-running operations.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{BackupId, Operation, OwnerId, ProgressEvent, Stage};
use crate::error::BackupError;

/// Event emitted while an orchestrator runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BackupEvent {
    /// A stage is about to start.
    Progress {
        /// Identity the operation runs for.
        owner_id: OwnerId,
        /// Backup or restore.
        operation: Operation,
        /// Stage, step and message.
        #[serde(flatten)]
        progress: ProgressEvent,
        /// Emission time.
        timestamp: DateTime<Utc>,
    },

    /// The operation reached `Done`.
    Completed {
        /// Identity the operation ran for.
        owner_id: OwnerId,
        /// Backup or restore.
        operation: Operation,
        /// Backup created or restored.
        backup_id: BackupId,
        /// Completion time.
        timestamp: DateTime<Utc>,
    },

    /// The operation stopped in `Failed`.
    Failed {
        /// Identity the operation ran for.
        owner_id: OwnerId,
        /// Backup or restore.
        operation: Operation,
        /// Backup being restored, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        backup_id: Option<BackupId>,
        /// Stage at which the run failed, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
        /// Human-readable cause.
        message: String,
        /// Failure time.
        timestamp: DateTime<Utc>,
    },
}

impl BackupEvent {
    /// Wraps a progress report.
    #[must_use]
    pub fn progress(owner_id: OwnerId, operation: Operation, progress: ProgressEvent) -> Self {
        Self::Progress {
            owner_id,
            operation,
            progress,
            timestamp: Utc::now(),
        }
    }

    /// Builds the terminal event for a finished run.
    #[must_use]
    pub fn outcome(
        owner_id: OwnerId,
        operation: Operation,
        backup_id: Option<&BackupId>,
        error: Option<&BackupError>,
    ) -> Self {
        match (error, backup_id) {
            (None, Some(id)) => Self::Completed {
                owner_id,
                operation,
                backup_id: id.clone(),
                timestamp: Utc::now(),
            },
            (error, backup_id) => Self::Failed {
                owner_id,
                operation,
                backup_id: backup_id.cloned(),
                stage: error.and_then(BackupError::stage),
                message: error.map_or_else(|| "no backup id produced".to_string(), ToString::to_string),
                timestamp: Utc::now(),
            },
        }
    }

    /// Returns the identity this event belongs to.
    #[must_use]
    pub fn owner_id(&self) -> &OwnerId {
        match self {
            Self::Progress { owner_id, .. }
            | Self::Completed { owner_id, .. }
            | Self::Failed { owner_id, .. } => owner_id,
        }
    }
}

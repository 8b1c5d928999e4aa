//! Orchestrator stages and the progress events reported for them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of progress steps reported per operation.
pub const STAGE_COUNT: u8 = 4;

/// Public operation an orchestrator is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `CreateBackup`.
    Backup,
    /// `RestoreBackup`.
    Restore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
        })
    }
}

/// State of the orchestrator's state machine.
///
/// Create runs `CheckingPermission -> CollectingLocal -> CollectingRemote
/// -> Serializing -> Uploading -> Done`; restore runs `Downloading ->
/// RestoringLocal -> RestoringRemote -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Consulting the permission gate.
    CheckingPermission,
    /// Reading the local key-value store.
    CollectingLocal,
    /// Reading the remote tables.
    CollectingRemote,
    /// Building and encoding the snapshot.
    Serializing,
    /// Writing the object and catalog entry.
    Uploading,
    /// Fetching and decoding a stored snapshot.
    Downloading,
    /// Overwriting the local store.
    RestoringLocal,
    /// Overwriting the remote tables.
    RestoringRemote,
    /// Finished successfully.
    Done,
}

impl Stage {
    /// One-based progress step, or `None` for stages folded into a
    /// neighbouring step (permission check, serialization).
    #[must_use]
    pub const fn progress_step(self) -> Option<u8> {
        match self {
            Self::CheckingPermission | Self::Serializing => None,
            Self::CollectingLocal | Self::Downloading => Some(1),
            Self::CollectingRemote | Self::RestoringLocal => Some(2),
            Self::Uploading | Self::RestoringRemote => Some(3),
            Self::Done => Some(STAGE_COUNT),
        }
    }

    /// Snake-case stage name used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckingPermission => "checking_permission",
            Self::CollectingLocal => "collecting_local",
            Self::CollectingRemote => "collecting_remote",
            Self::Serializing => "serializing",
            Self::Uploading => "uploading",
            Self::Downloading => "downloading",
            Self::RestoringLocal => "restoring_local",
            Self::RestoringRemote => "restoring_remote",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language of progress messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Locale {
    /// English.
    #[default]
    En,
    /// French.
    Fr,
    /// Arabic.
    Ar,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "fr" => Ok(Self::Fr),
            "ar" => Ok(Self::Ar),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

impl Locale {
    /// Localized description of `stage` within `operation`.
    #[must_use]
    pub const fn stage_message(self, operation: Operation, stage: Stage) -> &'static str {
        match (self, stage, operation) {
            (Self::En, Stage::CheckingPermission, _) => "Checking backup permission...",
            (Self::En, Stage::CollectingLocal, _) => "Collecting local data...",
            (Self::En, Stage::CollectingRemote, _) => "Collecting database records...",
            (Self::En, Stage::Serializing, _) => "Preparing backup file...",
            (Self::En, Stage::Uploading, _) => "Uploading backup...",
            (Self::En, Stage::Downloading, _) => "Downloading backup...",
            (Self::En, Stage::RestoringLocal, _) => "Restoring local data...",
            (Self::En, Stage::RestoringRemote, _) => "Restoring database records...",
            (Self::En, Stage::Done, Operation::Backup) => "Backup completed",
            (Self::En, Stage::Done, Operation::Restore) => "Restore completed",

            (Self::Fr, Stage::CheckingPermission, _) => "Vérification de l'autorisation...",
            (Self::Fr, Stage::CollectingLocal, _) => "Collecte des données locales...",
            (Self::Fr, Stage::CollectingRemote, _) => "Collecte des données de la base...",
            (Self::Fr, Stage::Serializing, _) => "Préparation du fichier de sauvegarde...",
            (Self::Fr, Stage::Uploading, _) => "Envoi de la sauvegarde...",
            (Self::Fr, Stage::Downloading, _) => "Téléchargement de la sauvegarde...",
            (Self::Fr, Stage::RestoringLocal, _) => "Restauration des données locales...",
            (Self::Fr, Stage::RestoringRemote, _) => "Restauration des données de la base...",
            (Self::Fr, Stage::Done, Operation::Backup) => "Sauvegarde terminée",
            (Self::Fr, Stage::Done, Operation::Restore) => "Restauration terminée",

            (Self::Ar, Stage::CheckingPermission, _) => "جارٍ التحقق من الصلاحية...",
            (Self::Ar, Stage::CollectingLocal, _) => "جارٍ جمع البيانات المحلية...",
            (Self::Ar, Stage::CollectingRemote, _) => "جارٍ جمع بيانات قاعدة البيانات...",
            (Self::Ar, Stage::Serializing, _) => "جارٍ تجهيز ملف النسخة الاحتياطية...",
            (Self::Ar, Stage::Uploading, _) => "جارٍ رفع النسخة الاحتياطية...",
            (Self::Ar, Stage::Downloading, _) => "جارٍ تنزيل النسخة الاحتياطية...",
            (Self::Ar, Stage::RestoringLocal, _) => "جارٍ استعادة البيانات المحلية...",
            (Self::Ar, Stage::RestoringRemote, _) => "جارٍ استعادة بيانات قاعدة البيانات...",
            (Self::Ar, Stage::Done, Operation::Backup) => "اكتمل النسخ الاحتياطي",
            (Self::Ar, Stage::Done, Operation::Restore) => "اكتملت الاستعادة",
        }
    }
}

/// Progress report emitted before a stage's work begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProgressEvent {
    /// Stage about to run.
    pub stage: Stage,
    /// One-based step within the operation.
    pub stage_index: u8,
    /// Total steps in the operation.
    pub stage_count: u8,
    /// Localized, human-readable description.
    pub message: String,
    /// Completion percentage, `stage_index / stage_count`.
    pub percentage: u8,
}

impl ProgressEvent {
    /// Builds the event for `stage`, or `None` if the stage reports no
    /// progress step of its own.
    #[must_use]
    pub fn for_stage(operation: Operation, stage: Stage, locale: Locale) -> Option<Self> {
        let step = stage.progress_step()?;
        let percentage = u16::from(step) * 100 / u16::from(STAGE_COUNT);
        Some(Self {
            stage,
            stage_index: step,
            stage_count: STAGE_COUNT,
            message: locale.stage_message(operation, stage).to_string(),
            percentage: u8::try_from(percentage).unwrap_or(100),
        })
    }
}

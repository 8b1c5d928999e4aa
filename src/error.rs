//! Backup service error types with HTTP status code mapping.
//!
//! [`BackupError`] is the central error type. Storage tiers report their own
//! narrower errors (see [`crate::persistence::error`]) which are converted
//! at component boundaries. Each variant maps to a specific HTTP status code
//! and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{BackupId, Operation, OwnerId, Stage, StorageLocation};
use crate::persistence::error::{
    CatalogError, LocalStoreError, ObjectStoreError, RemoteStoreError,
};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "backup not found: 3f1c...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Stage at which an orchestrated run failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Service-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category             | HTTP Status                   |
/// |-----------|----------------------|-------------------------------|
/// | 1000–1999 | Validation / decode  | 400 / 422                     |
/// | 2000–2999 | State / Not Found    | 404 / 409 / 410               |
/// | 3000–3999 | Storage / Server     | 500 / 502                     |
/// | 4000–4999 | Identity / Access    | 401 / 403                     |
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// The request carried no identity.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The permission gate rejected backup creation.
    #[error("backup not permitted for {0}")]
    PermissionDenied(OwnerId),

    /// Both the primary and fallback bucket writes failed. Carries the
    /// primary bucket's error.
    #[error("failed to store backup at {location}: {source}")]
    StorageWriteFailure {
        /// Primary location that was attempted.
        location: StorageLocation,
        /// Primary bucket error.
        source: ObjectStoreError,
    },

    /// The catalog exists but the insert failed.
    #[error("failed to record backup in catalog: {0}")]
    CatalogWriteFailure(CatalogError),

    /// The catalog exists but a read or delete failed.
    #[error("catalog query failed: {0}")]
    CatalogReadFailure(CatalogError),

    /// No catalog entry with this id belongs to the caller.
    #[error("backup not found: {0}")]
    NotFound(BackupId),

    /// The backup is past its retention window.
    #[error("backup expired: {0}")]
    BackupExpired(BackupId),

    /// Fetching the snapshot object failed.
    #[error("failed to read backup at {location}: {source}")]
    StorageReadFailure {
        /// Location recorded in the catalog.
        location: StorageLocation,
        /// Object store error.
        source: ObjectStoreError,
    },

    /// The snapshot was written by a newer, unknown format version.
    #[error("unsupported snapshot version {found}; newest supported is {supported}")]
    SchemaVersionUnsupported {
        /// Version string found in the payload.
        found: String,
        /// Newest version this build reads.
        supported: String,
    },

    /// The snapshot payload could not be decoded.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// The snapshot could not be encoded.
    #[error("snapshot serialization failed: {0}")]
    Serialization(String),

    /// Writing the local store failed during restore.
    #[error("local store error: {0}")]
    LocalStore(#[from] LocalStoreError),

    /// Writing a remote table failed during restore.
    #[error("remote store error: {0}")]
    RemoteStore(#[from] RemoteStoreError),

    /// An operation of the same kind is already running for this identity.
    #[error("a {0} is already in progress")]
    Busy(Operation),

    /// The caller cancelled the run before `stage` started.
    #[error("cancelled before {stage}")]
    Cancelled {
        /// First stage that did not run.
        stage: Stage,
    },

    /// A stage failed; no later stage ran.
    #[error("{stage} failed: {source}")]
    StageFailed {
        /// Stage that failed.
        stage: Stage,
        /// Underlying cause.
        source: Box<BackupError>,
    },

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BackupError {
    /// Wraps `self` with the stage it occurred in. Already staged or
    /// cancelled errors are returned unchanged.
    #[must_use]
    pub fn at(self, stage: Stage) -> Self {
        match self {
            Self::StageFailed { .. } | Self::Cancelled { .. } => self,
            other => Self::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage at which an orchestrated run stopped, if known.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailed { stage, .. } | Self::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Innermost error, skipping stage wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns `true` if a restore failed after local data was already
    /// overwritten, leaving local and remote state from different points
    /// in time.
    #[must_use]
    pub fn leaves_mixed_state(&self) -> bool {
        matches!(
            self,
            Self::StageFailed {
                stage: Stage::RestoringRemote,
                ..
            } | Self::Cancelled {
                stage: Stage::RestoringRemote
            }
        )
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::MalformedSnapshot(_) => 1002,
            Self::SchemaVersionUnsupported { .. } => 1003,
            Self::NotFound(_) => 2001,
            Self::BackupExpired(_) => 2002,
            Self::Busy(_) => 2003,
            Self::Cancelled { .. } => 2004,
            Self::Internal(_) => 3000,
            Self::StorageWriteFailure { .. } => 3001,
            Self::StorageReadFailure { .. } => 3002,
            Self::CatalogWriteFailure(_) => 3003,
            Self::CatalogReadFailure(_) => 3004,
            Self::LocalStore(_) => 3005,
            Self::RemoteStore(_) => 3006,
            Self::Serialization(_) => 3007,
            Self::NotAuthenticated => 4001,
            Self::PermissionDenied(_) => 4003,
            Self::StageFailed { source, .. } => source.error_code(),
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MalformedSnapshot(_) | Self::SchemaVersionUnsupported { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BackupExpired(_) => StatusCode::GONE,
            Self::Busy(_) | Self::Cancelled { .. } => StatusCode::CONFLICT,
            Self::StorageWriteFailure { .. } | Self::StorageReadFailure { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::CatalogWriteFailure(_)
            | Self::CatalogReadFailure(_)
            | Self::LocalStore(_)
            | Self::RemoteStore(_)
            | Self::Serialization(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::StageFailed { source, .. } => source.status_code(),
        }
    }
}

impl IntoResponse for BackupError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.stage().map(|stage| stage.to_string()),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

//! Backup handlers: create, list, get, restore, delete.
//!
//! Create and restore run on a detached task so a client disconnect never
//! interrupts a run halfway through. Progress and the final outcome are
//! published on the event bus for WebSocket clients.

use std::future::Future;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    BackupEntryDto, BackupListResponse, CreateBackupRequest, CreateBackupResponse, PaginationParams,
};
use crate::api::identity::Identity;
use crate::app_state::AppState;
use crate::domain::{BackupEvent, BackupId, BackupType, EventBus, Operation, OwnerId, ProgressEvent};
use crate::error::{BackupError, ErrorResponse};
use crate::service::CancellationToken;

/// Forwards progress reports to the bus as [`BackupEvent::Progress`].
fn progress_publisher(
    bus: EventBus,
    owner: OwnerId,
    operation: Operation,
) -> impl FnMut(ProgressEvent) + Send + 'static {
    move |progress| {
        bus.publish(BackupEvent::progress(owner.clone(), operation, progress));
    }
}

/// Runs `run` to completion on its own task.
async fn run_detached<T: Send + 'static>(
    run: impl Future<Output = Result<T, BackupError>> + Send + 'static,
) -> Result<T, BackupError> {
    tokio::spawn(run)
        .await
        .map_err(|e| BackupError::Internal(format!("run aborted: {e}")))?
}

/// Parses the optional create body. An empty body means all defaults.
fn parse_create_request(body: &[u8]) -> Result<CreateBackupRequest, BackupError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateBackupRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| BackupError::InvalidRequest(format!("invalid body: {e}")))
}

/// `POST /backups` — Snapshot the caller's data.
///
/// # Errors
///
/// Returns [`BackupError`] if the run fails; the body names the stage.
#[utoipa::path(
    post,
    path = "/api/v1/backups",
    tag = "Backups",
    summary = "Create a backup",
    description = "Collects the caller's local and remote data, uploads the snapshot and records it in the catalog. Progress is streamed on `/ws`.",
    params(("x-owner-id" = String, Header, description = "Caller identity")),
    request_body(content = CreateBackupRequest, description = "Optional; an empty body creates a manual backup"),
    responses(
        (status = 201, description = "Backup created", body = CreateBackupResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
        (status = 403, description = "Plan does not allow backups", body = ErrorResponse),
        (status = 409, description = "A backup is already running", body = ErrorResponse),
        (status = 502, description = "Object storage unavailable", body = ErrorResponse),
    )
)]
pub async fn create_backup(
    State(state): State<AppState>,
    Identity(owner): Identity,
    body: Bytes,
) -> Result<impl IntoResponse, BackupError> {
    let req = parse_create_request(&body)?;
    let backup_type = req.backup_type.unwrap_or(BackupType::Manual);
    let orchestrator = state.registry.get_or_connect(&owner).await;
    let bus = state.event_bus.clone();

    let backup_id = run_detached(async move {
        let on_progress = progress_publisher(bus.clone(), owner.clone(), Operation::Backup);
        let result = orchestrator
            .create_backup(backup_type, on_progress, &CancellationToken::new())
            .await;
        bus.publish(BackupEvent::outcome(
            owner,
            Operation::Backup,
            result.as_ref().ok(),
            result.as_ref().err(),
        ));
        result
    })
    .await?;

    let response = CreateBackupResponse {
        catalogued: !backup_id.is_synthesized(),
        backup_id,
        backup_type,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /backups` — List the caller's backups.
///
/// # Errors
///
/// Returns [`BackupError::CatalogReadFailure`] if the catalog query fails.
#[utoipa::path(
    get,
    path = "/api/v1/backups",
    tag = "Backups",
    summary = "List backups",
    description = "Returns the caller's catalogued backups, newest first. An unprovisioned catalog yields an empty list.",
    params(("x-owner-id" = String, Header, description = "Caller identity"), PaginationParams),
    responses(
        (status = 200, description = "Paginated backup list", body = BackupListResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn list_backups(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, BackupError> {
    let orchestrator = state.registry.get_or_connect(&owner).await;
    let entries = orchestrator.list_backups().await?;

    let now = Utc::now();
    let (page, pagination) = params.paginate(entries);
    let data = page
        .into_iter()
        .map(|entry| BackupEntryDto::from_entry(entry, now))
        .collect();

    Ok(Json(BackupListResponse { data, pagination }))
}

/// `GET /backups/{id}` — Get one backup.
///
/// # Errors
///
/// Returns [`BackupError::NotFound`] if the caller owns no such backup.
#[utoipa::path(
    get,
    path = "/api/v1/backups/{id}",
    tag = "Backups",
    summary = "Get backup details",
    params(
        ("x-owner-id" = String, Header, description = "Caller identity"),
        ("id" = String, Path, description = "Backup id"),
    ),
    responses(
        (status = 200, description = "Backup details", body = BackupEntryDto),
        (status = 404, description = "Backup not found", body = ErrorResponse),
    )
)]
pub async fn get_backup(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path(id): Path<BackupId>,
) -> Result<impl IntoResponse, BackupError> {
    let orchestrator = state.registry.get_or_connect(&owner).await;
    let entry = orchestrator.get_backup(&id).await?;
    Ok(Json(BackupEntryDto::from_entry(entry, Utc::now())))
}

/// `POST /backups/{id}/restore` — Replace the caller's data with a backup.
///
/// # Errors
///
/// Returns [`BackupError`] if the run fails; the body names the stage.
#[utoipa::path(
    post,
    path = "/api/v1/backups/{id}/restore",
    tag = "Backups",
    summary = "Restore a backup",
    description = "Destructive: clears the local store and the caller's rows in every remote table, then writes the snapshot. Progress is streamed on `/ws`.",
    params(
        ("x-owner-id" = String, Header, description = "Caller identity"),
        ("id" = String, Path, description = "Backup id"),
    ),
    responses(
        (status = 204, description = "Backup restored"),
        (status = 404, description = "Backup not found", body = ErrorResponse),
        (status = 409, description = "A restore is already running", body = ErrorResponse),
        (status = 410, description = "Backup expired", body = ErrorResponse),
        (status = 422, description = "Unsupported snapshot version", body = ErrorResponse),
    )
)]
pub async fn restore_backup(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path(id): Path<BackupId>,
) -> Result<impl IntoResponse, BackupError> {
    let orchestrator = state.registry.get_or_connect(&owner).await;
    let bus = state.event_bus.clone();

    run_detached(async move {
        let on_progress = progress_publisher(bus.clone(), owner.clone(), Operation::Restore);
        let result = orchestrator
            .restore_backup(&id, on_progress, &CancellationToken::new())
            .await;
        if let Err(e) = &result
            && e.leaves_mixed_state()
        {
            tracing::error!(%owner, %id, "restore left local and remote data out of sync");
        }
        bus.publish(BackupEvent::outcome(
            owner,
            Operation::Restore,
            Some(&id),
            result.as_ref().err(),
        ));
        result
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /backups/{id}` — Delete a backup.
///
/// # Errors
///
/// Returns [`BackupError::NotFound`] if the caller owns no such backup.
#[utoipa::path(
    delete,
    path = "/api/v1/backups/{id}",
    tag = "Backups",
    summary = "Delete a backup",
    description = "Removes the stored object and the catalog entry.",
    params(
        ("x-owner-id" = String, Header, description = "Caller identity"),
        ("id" = String, Path, description = "Backup id"),
    ),
    responses(
        (status = 204, description = "Backup deleted"),
        (status = 404, description = "Backup not found", body = ErrorResponse),
    )
)]
pub async fn delete_backup(
    State(state): State<AppState>,
    Identity(owner): Identity,
    Path(id): Path<BackupId>,
) -> Result<impl IntoResponse, BackupError> {
    let orchestrator = state.registry.get_or_connect(&owner).await;
    orchestrator.delete_backup(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Backup routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/backups", post(create_backup).get(list_backups))
        .route("/backups/{id}", get(get_backup).delete(delete_backup))
        .route("/backups/{id}/restore", post(restore_backup))
}

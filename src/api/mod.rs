//! REST API layer: route handlers, DTOs, identity, and router composition.
//!
//! All backup endpoints are mounted under `/api/v1` and act for the
//! identity in the [`identity::OWNER_HEADER`] header.

pub mod dto;
pub mod handlers;
pub mod identity;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "classroom-backup", description = "Backup and restore of classroom data"),
    paths(
        handlers::backup::create_backup,
        handlers::backup::list_backups,
        handlers::backup::get_backup,
        handlers::backup::restore_backup,
        handlers::backup::delete_backup,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::CreateBackupRequest,
        dto::CreateBackupResponse,
        dto::BackupEntryDto,
        dto::BackupListResponse,
        dto::PaginationMeta,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Backups", description = "Create, list, restore and delete backups"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, docs, and middleware.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_backup_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/backups"));
        assert!(doc.paths.paths.contains_key("/api/v1/backups/{id}/restore"));
        assert!(doc.paths.paths.contains_key("/health"));
    }
}

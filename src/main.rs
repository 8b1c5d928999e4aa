//! classroom-backup server entry point.
//!
//! Wires the storage backends, starts the Axum HTTP server with REST and
//! WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use classroom_backup::api;
use classroom_backup::app_state::AppState;
use classroom_backup::config::{BackupConfig, LogFormat};
use classroom_backup::domain::EventBus;
use classroom_backup::persistence::{
    FileLocalStores, FsObjectStore, PostgresCatalog, PostgresPlanLookup, PostgresTables,
};
use classroom_backup::service::{BackupDeps, OrchestratorRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BackupConfig::from_env().context("invalid LISTEN_ADDR")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting classroom-backup");

    // Database
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    if config.database_run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;
        tracing::info!("migrations applied");
    }

    // Storage tiers
    let deps = BackupDeps::new(
        Arc::new(FileLocalStores::new(config.local_store_dir.clone())),
        Arc::new(PostgresTables::new(pool.clone())),
        Arc::new(FsObjectStore::new(config.object_store_root.clone())),
        Arc::new(PostgresCatalog::new(pool.clone())),
        Arc::new(PostgresPlanLookup::new(pool)),
    )
    .with_settings(config.backup_settings());

    // Application state
    let app_state = AppState::new(
        Arc::new(OrchestratorRegistry::new(deps).with_capacity(config.registry_capacity)),
        EventBus::new(config.event_bus_capacity),
    );
    let app = api::build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

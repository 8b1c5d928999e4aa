//! # classroom-backup
//!
//! Backup and restore service for a teacher's classroom data.
//!
//! A backup snapshots two tiers of state into one versioned JSON document:
//! the allow-listed part of a local key-value store and the identity's rows
//! in a fixed set of remote tables. The snapshot is uploaded to object
//! storage (with a fallback bucket) and recorded in a catalog with a
//! retention window. Restore downloads a snapshot and destructively
//! replaces both tiers.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── OrchestratorRegistry → BackupOrchestrator (service/)
//!     ├── EventBus (domain/)
//!     │
//!     └── Storage tiers (persistence/)
//!         ├── LocalStore      (JSON file per identity)
//!         ├── RemoteTables    (PostgreSQL)
//!         ├── ObjectStore     (filesystem buckets)
//!         ├── CatalogStore    (PostgreSQL `backups`)
//!         └── PlanLookup      (PostgreSQL `subscriptions`)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;

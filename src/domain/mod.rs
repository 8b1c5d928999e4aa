//! Domain layer: identities, snapshot schema, catalog entries, and events.
//!
//! This module contains the value types shared by every component: owner
//! and backup identity, the versioned snapshot wire format, catalog
//! records with their lifecycle, orchestrator stages with localized
//! progress, and the event bus that streams progress to clients.

pub mod backup_event;
pub mod backup_id;
pub mod catalog_entry;
pub mod event_bus;
pub mod owner_id;
pub mod progress;
pub mod remote_table;
pub mod snapshot;

pub use backup_event::BackupEvent;
pub use backup_id::BackupId;
pub use catalog_entry::{
    BackupStatus, BackupType, CatalogEntry, DEFAULT_RETENTION_DAYS, StorageLocation, StoredObject,
};
pub use event_bus::EventBus;
pub use owner_id::OwnerId;
pub use progress::{Locale, Operation, ProgressEvent, STAGE_COUNT, Stage};
pub use remote_table::RemoteTable;
pub use snapshot::{
    FieldValue, LocalDataset, RemoteDataset, Row, SchemaVersion, Snapshot, SnapshotSummary,
};

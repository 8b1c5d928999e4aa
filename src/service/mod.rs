//! Service layer: backup and restore orchestration.
//!
//! [`BackupOrchestrator`] drives each run through its stages using the
//! components in this module: the permission gate, the local and remote
//! collectors, the snapshot codec, the uploader and downloader, and the
//! restorers. [`OrchestratorRegistry`] hands out one orchestrator per
//! identity.

pub mod cancellation;
pub mod catalog_recorder;
pub mod collector;
pub mod downloader;
pub mod orchestrator;
pub mod permission;
pub mod registry;
pub mod restorer;
pub mod snapshot_builder;
pub mod uploader;

pub use cancellation::CancellationToken;
pub use catalog_recorder::CatalogRecorder;
pub use collector::{DEFAULT_RETAINED_PREFIXES, LocalDataCollector, RemoteDataCollector};
pub use downloader::SnapshotDownloader;
pub use orchestrator::{BackupDeps, BackupOrchestrator, BackupSettings};
pub use permission::{BackupPolicy, PaidTierPolicy, PermissionGate};
pub use registry::{DEFAULT_REGISTRY_CAPACITY, OrchestratorRegistry};
pub use restorer::{LocalRestorer, RemoteRestorer};
pub use snapshot_builder::{JsonSnapshotCodec, SnapshotBuilder, SnapshotCodec};
pub use uploader::{ObjectStoreUploader, UploadReceipt, backup_object_path};

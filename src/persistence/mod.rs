//! Persistence layer: the storage tiers a backup spans.
//!
//! Each tier is an object-safe async trait with an in-memory implementation
//! and a concrete backend:
//!
//! | Tier             | Trait            | Backends                               |
//! |------------------|------------------|----------------------------------------|
//! | Local key-value  | [`LocalStore`]   | `MemoryLocalStore`, `FileLocalStore`   |
//! | Remote tables    | [`RemoteTables`] | `MemoryRemoteTables`, `PostgresTables` |
//! | Object storage   | [`ObjectStore`]  | `MemoryObjectStore`, `FsObjectStore`   |
//! | Backup catalog   | [`CatalogStore`] | `MemoryCatalog`, `PostgresCatalog`     |
//! | Subscriptions    | [`PlanLookup`]   | `StaticPlanLookup`, `PostgresPlanLookup` |
//!
//! Local stores are scoped to one identity; a [`LocalStoreProvider`]
//! (`MemoryLocalStores`, `FileLocalStores`) hands each identity its own.

pub mod catalog;
pub mod error;
pub mod local;
pub mod models;
pub mod object_store;
pub mod plans;
pub mod postgres;
pub mod remote;

pub use catalog::{CatalogStore, MemoryCatalog, ProvisioningState, probe_provisioning};
pub use local::{
    FileLocalStore, FileLocalStores, LocalStore, LocalStoreProvider, MemoryLocalStore,
    MemoryLocalStores,
};
pub use object_store::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use plans::{PlanLookup, StaticPlanLookup, SubscriptionPlan};
pub use postgres::{PostgresCatalog, PostgresPlanLookup, PostgresTables};
pub use remote::{MemoryRemoteTables, RemoteTables};

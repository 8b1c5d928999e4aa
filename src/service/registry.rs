//! Lazily built orchestrators, one per identity.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::orchestrator::{BackupDeps, BackupOrchestrator};
use crate::domain::OwnerId;

/// Default number of identities kept before idle orchestrators are dropped.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 1_024;

/// Shares one [`BackupOrchestrator`] per identity so that single-flight
/// guards apply across requests.
///
/// When connecting a new identity would exceed the capacity, orchestrators
/// that no caller currently holds are dropped first. Orchestrators with a
/// run in flight are never dropped, so the map may briefly exceed the
/// capacity.
#[derive(Debug)]
pub struct OrchestratorRegistry {
    deps: BackupDeps,
    capacity: usize,
    orchestrators: RwLock<HashMap<OwnerId, Arc<BackupOrchestrator>>>,
}

impl OrchestratorRegistry {
    /// Creates an empty registry building orchestrators from `deps`.
    #[must_use]
    pub fn new(deps: BackupDeps) -> Self {
        Self {
            deps,
            capacity: DEFAULT_REGISTRY_CAPACITY,
            orchestrators: RwLock::new(HashMap::new()),
        }
    }

    /// Sets how many identities are kept before idle ones are dropped.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Backends and settings orchestrators are built from.
    #[must_use]
    pub fn deps(&self) -> &BackupDeps {
        &self.deps
    }

    /// Returns `owner`'s orchestrator, connecting it on first use.
    pub async fn get_or_connect(&self, owner: &OwnerId) -> Arc<BackupOrchestrator> {
        if let Some(existing) = self.orchestrators.read().await.get(owner) {
            return Arc::clone(existing);
        }

        let connected = Arc::new(BackupOrchestrator::connect(owner.clone(), &self.deps).await);
        let mut map = self.orchestrators.write().await;
        // Another request may have connected in the meantime.
        if let Some(existing) = map.get(owner) {
            return Arc::clone(existing);
        }
        if map.len() >= self.capacity {
            let before = map.len();
            map.retain(|_, orchestrator| Arc::strong_count(orchestrator) > 1);
            tracing::debug!(evicted = before - map.len(), "dropped idle orchestrators");
        }
        map.insert(owner.clone(), Arc::clone(&connected));
        connected
    }

    /// Drops `owner`'s orchestrator so the next request re-probes the
    /// catalog. Runs already in flight keep their handle.
    pub async fn evict(&self, owner: &OwnerId) -> bool {
        self.orchestrators.write().await.remove(owner).is_some()
    }

    /// Returns the number of connected orchestrators.
    pub async fn len(&self) -> usize {
        self.orchestrators.read().await.len()
    }

    /// Returns `true` if no orchestrator has been connected.
    pub async fn is_empty(&self) -> bool {
        self.orchestrators.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::{
        MemoryCatalog, MemoryLocalStores, MemoryObjectStore, MemoryRemoteTables, StaticPlanLookup,
    };

    fn deps() -> BackupDeps {
        BackupDeps::new(
            Arc::new(MemoryLocalStores::new()),
            Arc::new(MemoryRemoteTables::new()),
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryCatalog::new()),
            Arc::new(StaticPlanLookup::new()),
        )
    }

    fn owner(id: &str) -> OwnerId {
        let Some(owner) = OwnerId::parse(id) else {
            panic!("valid owner");
        };
        owner
    }

    #[tokio::test]
    async fn same_owner_shares_orchestrator() {
        let registry = OrchestratorRegistry::new(deps());
        let a = registry.get_or_connect(&owner("U1")).await;
        let b = registry.get_or_connect(&owner("U1")).await;
        assert!(Arc::ptr_eq(&a, &b));
        let _c = registry.get_or_connect(&owner("U2")).await;
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn evict_forces_reconnect() {
        let registry = OrchestratorRegistry::new(deps());
        let a = registry.get_or_connect(&owner("U1")).await;
        assert!(registry.evict(&owner("U1")).await);
        assert!(!registry.evict(&owner("U1")).await);
        let b = registry.get_or_connect(&owner("U1")).await;
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn full_registry_drops_idle_orchestrators_only() {
        let registry = OrchestratorRegistry::new(deps()).with_capacity(2);
        let held = registry.get_or_connect(&owner("U1")).await;
        let _ = registry.get_or_connect(&owner("U2")).await;
        assert_eq!(registry.len().await, 2);

        let _ = registry.get_or_connect(&owner("U3")).await;
        assert_eq!(registry.len().await, 2);
        let again = registry.get_or_connect(&owner("U1")).await;
        assert!(Arc::ptr_eq(&held, &again));
    }
}

//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::OrchestratorRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Per-identity orchestrators.
    pub registry: Arc<OrchestratorRegistry>,
    /// Event bus for WebSocket progress streaming.
    pub event_bus: EventBus,
}

impl AppState {
    /// Creates the state from a registry and a bus.
    #[must_use]
    pub fn new(registry: Arc<OrchestratorRegistry>, event_bus: EventBus) -> Self {
        Self {
            registry,
            event_bus,
        }
    }
}

//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::api::identity::Identity;
use crate::app_state::AppState;

/// `GET /ws` — Upgrade to a WebSocket streaming the caller's backup events.
///
/// The identity header is required on the upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Identity(owner): Identity,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let event_rx = state.event_bus.subscribe();
    ws.on_upgrade(move |socket| run_connection(socket, owner, event_rx))
}

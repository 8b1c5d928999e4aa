//! WebSocket connection loop.
//!
//! Forwards the connected identity's backup events to the client and
//! answers the few commands a client may send.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use crate::domain::{BackupEvent, OwnerId};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards events from the [`broadcast::Receiver`] that belong to
///   `owner`; other identities' events are never sent.
pub async fn run_connection(
    socket: WebSocket,
    owner: OwnerId,
    mut event_rx: broadcast::Receiver<BackupEvent>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::debug!(%owner, "ws connection opened");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text);
                        if let Some(json) = reply
                            && ws_tx.send(Message::text(json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if event.owner_id() != &owner {
                            continue;
                        }
                        let json = serde_json::to_string(&WsMessage::event(&event)).unwrap_or_default();
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(%owner, lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!(%owner, "ws connection closed");
}

/// Handles a text message from the client, returning an optional JSON reply.
fn handle_text_message(text: &str) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error(String::new(), 400, "malformed JSON")).ok();
    };
    if msg.msg_type != WsMessageType::Command {
        return serde_json::to_string(&WsMessage::error(msg.id, 400, "expected a command")).ok();
    }

    let reply = match serde_json::from_value::<WsCommand>(msg.payload) {
        Ok(WsCommand::Ping) => WsMessage::response(msg.id, serde_json::json!({ "pong": true })),
        Err(_) => WsMessage::error(msg.id, 404, "unknown command"),
    };
    serde_json::to_string(&reply).ok()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn parse(reply: Option<String>) -> WsMessage {
        let Some(json) = reply else {
            panic!("reply expected");
        };
        let Ok(msg) = serde_json::from_str::<WsMessage>(&json) else {
            panic!("reply is a message");
        };
        msg
    }

    #[test]
    fn ping_gets_pong() {
        let reply = parse(handle_text_message(
            r#"{"id":"1","type":"command","timestamp":"2026-01-01T00:00:00Z","payload":{"command":"ping"}}"#,
        ));
        assert_eq!(reply.msg_type, WsMessageType::Response);
        assert_eq!(reply.id, "1");
        assert_eq!(reply.payload["pong"], true);
    }

    #[test]
    fn unknown_command_is_an_error() {
        let reply = parse(handle_text_message(
            r#"{"id":"2","type":"command","timestamp":"2026-01-01T00:00:00Z","payload":{"command":"subscribe"}}"#,
        ));
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 404);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let reply = parse(handle_text_message("{nope"));
        assert_eq!(reply.msg_type, WsMessageType::Error);
        assert_eq!(reply.payload["code"], 400);
    }
}

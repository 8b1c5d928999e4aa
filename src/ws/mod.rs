//! WebSocket layer: progress streaming.
//!
//! The endpoint at `/ws` streams [`crate::domain::BackupEvent`]s for the
//! identity that opened the connection.

pub mod connection;
pub mod handler;
pub mod messages;

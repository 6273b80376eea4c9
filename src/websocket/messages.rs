//! WebSocket Message Types
//!
//! Messages exchanged with monitoring clients over `/1/queries/monitoring`.

use crate::ingest::ProgressSnapshot;
use serde::{Deserialize, Serialize};

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping for keepalive
    Ping,
    /// Ask for the current ingestion progress
    Progress,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected {
        /// Unique connection identifier
        connection_id: String,
    },
    /// Ingestion counters
    Progress {
        indexed: u64,
        rejected: u64,
        failed: u64,
        completed: bool,
    },
    /// Pong response to ping
    Pong,
    /// Error message
    Error {
        /// Error description
        message: String,
    },
}

impl From<ProgressSnapshot> for ServerMessage {
    fn from(snapshot: ProgressSnapshot) -> Self {
        ServerMessage::Progress {
            indexed: snapshot.indexed,
            rejected: snapshot.rejected,
            failed: snapshot.failed,
            completed: snapshot.completed,
        }
    }
}

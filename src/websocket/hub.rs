//! WebSocket Connection Hub
//!
//! Tracks monitoring connections and fans progress updates out to them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::ingest::IngestProgress;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Manages all monitoring connections
pub struct ConnectionHub {
    /// Active connections: ConnectionId → outbound queue
    connections: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>>,
    config: HubConfig,
}

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
        }
    }
}

impl ConnectionHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register a new WebSocket connection
    ///
    /// Returns the connection ID on success, or an error if the connection
    /// limit has been reached.
    pub async fn register(
        &self,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        connections.insert(id.clone(), sender);

        tracing::info!(connection_id = %id, "Monitoring client connected");
        Ok(id)
    }

    pub async fn unregister(&self, id: &str) {
        if self.connections.write().await.remove(id).is_some() {
            tracing::info!(connection_id = %id, "Monitoring client disconnected");
        }
    }

    /// Send a message directly to a specific connection
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        let sender = connections.get(id).ok_or(HubError::ConnectionNotFound)?;

        sender.send(message).map_err(|_| HubError::SendFailed)
    }

    /// Send a message to every connection, returning how many accepted it
    pub async fn broadcast(&self, message: &ServerMessage) -> usize {
        let connections = self.connections.read().await;

        let sent = connections
            .values()
            .filter(|sender| sender.send(message.clone()).is_ok())
            .count();

        if sent > 0 {
            tracing::trace!(clients = sent, "Broadcast message");
        }
        sent
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

/// Push ingestion progress to every monitoring client
///
/// Each tick compares the current snapshot with the last one sent and
/// broadcasts only when it changed. Runs until the handle is aborted.
pub fn spawn_progress_broadcaster(
    hub: Arc<ConnectionHub>,
    progress: Arc<IngestProgress>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last = None;

        loop {
            ticker.tick().await;

            let snapshot = progress.snapshot();
            if last == Some(snapshot) {
                continue;
            }
            hub.broadcast(&ServerMessage::from(snapshot)).await;
            last = Some(snapshot);
        }
    })
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Failed to send message")]
    SendFailed,
}

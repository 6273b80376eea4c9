//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::ConnectionHub;
use super::messages::{ClientMessage, ServerMessage};
use crate::api::AppState;
use crate::ingest::IngestProgress;

/// GET /1/queries/monitoring
///
/// Upgrades to a WebSocket that streams ingestion progress.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.hub);
    let progress = Arc::clone(&state.progress);
    ws.on_upgrade(move |socket| handle_socket(socket, hub, progress))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>, progress: Arc<IngestProgress>) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match hub.register(tx.clone()).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected monitoring connection");
            if let Some(msg) = encode(&ServerMessage::Error {
                message: e.to_string(),
            }) {
                let _ = sender.send(msg).await;
            }
            return;
        }
    };

    // Greeting plus the current counters, ahead of any broadcast
    let _ = tx.send(ServerMessage::Connected {
        connection_id: connection_id.clone(),
    });
    let _ = tx.send(ServerMessage::from(progress.snapshot()));
    drop(tx);

    let conn_id_for_send = connection_id.clone();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let Some(frame) = encode(&message) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let hub_for_recv = Arc::clone(&hub);
    let conn_id_for_recv = connection_id.clone();

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &progress, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(
    hub: &ConnectionHub,
    progress: &IngestProgress,
    connection_id: &str,
    message: Message,
) -> bool {
    let reply = match message {
        Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Ping) => ServerMessage::Pong,
            Ok(ClientMessage::Progress) => ServerMessage::from(progress.snapshot()),
            Err(e) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    error = %e,
                    "Invalid client message"
                );
                ServerMessage::Error {
                    message: format!("Invalid message format: {}", e),
                }
            }
        },
        Message::Binary(_) => ServerMessage::Error {
            message: "Binary messages not supported".to_string(),
        },
        // Axum answers protocol pings itself
        Message::Ping(_) | Message::Pong(_) => return true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            return false;
        }
    };

    hub.send_to(connection_id, reply).await.is_ok()
}

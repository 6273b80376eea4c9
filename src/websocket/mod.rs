//! Monitoring WebSocket
//!
//! Streams ingestion progress to dashboard clients.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: Tracks active connections and broadcasts to them
//! - **Handler**: Handles WebSocket upgrade and message processing
//! - **Messages**: Defines client and server message formats
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket('ws://localhost:5000/1/queries/monitoring');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'progress') console.log(msg.indexed, 'records indexed');
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::websocket_handler;
pub use hub::{spawn_progress_broadcaster, ConnectionHub, HubConfig, HubError};
pub use messages::{ClientMessage, ServerMessage};

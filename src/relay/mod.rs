//! Broadcast Relay Core
//!
//! The connection registry and broadcast fan-out engine behind the `/ws`
//! endpoint. Every inbound JSON message from one peer is forwarded to all
//! open peers, including the sender; the relay never interprets payloads.
//!
//! ## Architecture
//!
//! - **Registry**: concurrency-safe membership map with point-in-time
//!   snapshots
//! - **Broadcaster**: fans a decoded message out to a registry snapshot,
//!   tolerating per-recipient failures
//! - **LifecycleController**: open/message/close/error entry points driven
//!   by the transport
//! - **Handler**: axum WebSocket upgrade and per-connection pump tasks
//!
//! ## Example
//!
//! ```javascript
//! // Browser peer
//! const ws = new WebSocket('ws://localhost:8080/ws');
//! ws.onopen = () => ws.send(JSON.stringify({type: 'offer', sdp: '...'}));
//! ws.onmessage = (event) => console.log('Relayed:', JSON.parse(event.data));
//! ```

mod broadcast;
mod handler;
mod lifecycle;
mod message;
mod registry;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use handler::websocket_handler;
pub use lifecycle::LifecycleController;
pub use message::{DecodeError, RelayMessage};
pub use registry::{
    Connection, ConnectionId, ConnectionState, Registry, RegistryError, SendError,
};

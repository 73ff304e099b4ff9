//! Connection Registry
//!
//! Tracks every live connection and hands out point-in-time membership
//! snapshots for broadcast passes. The registry is the only shared mutable
//! state in the relay; all mutation goes through its lock, and snapshots are
//! copies that stay stable while concurrent register/deregister calls land.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Unique identifier for a connection, used only for log correlation.
pub type ConnectionId = String;

/// Per-connection lifecycle state.
///
/// `Connecting` is transient (between upgrade and the open event). Only
/// `Open` connections are eligible to receive broadcasts. `Closed` is
/// terminal; a closed connection is evicted and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// One peer's live stream.
///
/// Owns the outbound half of the connection as a channel sender; the socket
/// pump task drains the channel into the actual sink. Sends are therefore
/// non-blocking, and a slow peer never stalls a broadcast pass.
pub struct Connection {
    id: ConnectionId,
    sender: mpsc::UnboundedSender<String>,
    state: RwLock<ConnectionState>,
}

impl Connection {
    /// Create a new connection in the `Connecting` state.
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Arc<Self> {
        // Short id, enough for log correlation
        let id = Uuid::new_v4().simple().to_string()[..8].to_string();
        Arc::new(Self {
            id,
            sender,
            state: RwLock::new(ConnectionState::Connecting),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Transition to `Open`. No-op once closed.
    pub async fn mark_open(&self) {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Open;
        }
    }

    /// Transition to `Closed`. Returns false if already closed, which makes
    /// the close path idempotent.
    pub async fn mark_closed(&self) -> bool {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Closed {
            return false;
        }
        *state = ConnectionState::Closed;
        true
    }

    /// Queue a text frame for delivery to this peer.
    ///
    /// Fails when the outbound pump is gone (peer disconnected mid-pass).
    /// A failure here is observed by the caller but never mutates
    /// membership; deregistration is driven by the close signal alone.
    pub fn send(&self, text: String) -> Result<(), SendError> {
        self.sender
            .send(text)
            .map_err(|_| SendError(self.id.clone()))
    }
}

/// The outbound channel for a connection has been dropped
#[derive(Debug, Error)]
#[error("connection {0} is no longer writable")]
pub struct SendError(pub ConnectionId);

/// Concurrency-safe mapping of all currently tracked connections.
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    max_connections: usize,
}

impl Registry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Insert a connection.
    ///
    /// A duplicate id overwrites the existing entry with a warning - that is
    /// a collaborator bug, not a protocol violation, and must not be fatal.
    /// Fails only when the connection limit is reached.
    pub async fn register(&self, conn: Arc<Connection>) -> Result<(), RegistryError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_connections && !connections.contains_key(conn.id()) {
            return Err(RegistryError::AtCapacity(self.max_connections));
        }

        let id = conn.id().to_string();
        if connections.insert(id.clone(), conn).is_some() {
            tracing::warn!(connection_id = %id, "Duplicate register, entry replaced");
        }

        tracing::info!(
            connection_id = %id,
            total = connections.len(),
            "Connection registered"
        );
        Ok(())
    }

    /// Remove a connection unconditionally.
    ///
    /// Idempotent; deregistering an absent id is a no-op.
    pub async fn deregister(&self, id: &str) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            tracing::info!(
                connection_id = %id,
                total = connections.len(),
                "Connection deregistered"
            );
        }
    }

    /// Point-in-time copy of the current membership.
    ///
    /// The returned sequence stays stable while concurrent register and
    /// deregister calls mutate the registry.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Current membership count, for observability only.
    pub async fn size(&self) -> usize {
        self.connections.read().await.len()
    }
}

/// Errors that can occur when registering a connection
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("connection limit reached ({0})")]
    AtCapacity(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_connection() -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    #[tokio::test]
    async fn test_register_deregister() {
        let registry = Registry::new(16);
        let (conn, _rx) = test_connection();
        let id = conn.id().to_string();

        registry.register(conn).await.unwrap();
        assert_eq!(registry.size().await, 1);

        registry.deregister(&id).await;
        assert_eq!(registry.size().await, 0);
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let registry = Registry::new(16);
        let (conn, _rx) = test_connection();
        let id = conn.id().to_string();

        registry.register(conn).await.unwrap();
        registry.deregister(&id).await;
        registry.deregister(&id).await;
        registry.deregister("never-registered").await;
        assert_eq!(registry.size().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_register_overwrites() {
        let registry = Registry::new(16);
        let (conn, _rx) = test_connection();

        registry.register(Arc::clone(&conn)).await.unwrap();
        registry.register(conn).await.unwrap();
        assert_eq!(registry.size().await, 1);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let registry = Registry::new(2);
        let (a, _rx_a) = test_connection();
        let (b, _rx_b) = test_connection();
        let (c, _rx_c) = test_connection();

        registry.register(a).await.unwrap();
        registry.register(b).await.unwrap();

        let result = registry.register(c).await;
        assert!(matches!(result, Err(RegistryError::AtCapacity(2))));
        assert_eq!(registry.size().await, 2);
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_under_mutation() {
        let registry = Registry::new(16);
        let (a, _rx_a) = test_connection();
        let (b, _rx_b) = test_connection();
        let a_id = a.id().to_string();

        registry.register(a).await.unwrap();
        registry.register(b).await.unwrap();

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);

        // Mutations after the snapshot do not affect it
        registry.deregister(&a_id).await;
        let (c, _rx_c) = test_connection();
        registry.register(c).await.unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.iter().any(|conn| conn.id() == a_id));
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (conn, _rx) = test_connection();
        assert_eq!(conn.state().await, ConnectionState::Connecting);

        conn.mark_open().await;
        assert_eq!(conn.state().await, ConnectionState::Open);

        assert!(conn.mark_closed().await);
        assert!(!conn.mark_closed().await);
        assert_eq!(conn.state().await, ConnectionState::Closed);

        // Closed is terminal
        conn.mark_open().await;
        assert_eq!(conn.state().await, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_send_fails_when_receiver_dropped() {
        let (conn, rx) = test_connection();
        drop(rx);
        assert!(conn.send("{}".to_string()).is_err());
    }
}

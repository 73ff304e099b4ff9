//! Connection Lifecycle Controller
//!
//! Entry points invoked by the transport glue for each connection event.
//! Mediates between the transport and the registry/broadcast engine, driving
//! the per-connection state machine Connecting -> Open -> Closed (terminal;
//! an error before open goes straight to Closed).
//!
//! Every failure at this layer recovers locally: a malformed frame is
//! dropped, a delivery failure skips one recipient, a transport error is
//! logged. Nothing here is fatal to the process or to other connections.

use std::sync::Arc;

use super::broadcast::{BroadcastReport, Broadcaster};
use super::message::{DecodeError, RelayMessage};
use super::registry::{Connection, Registry, RegistryError};

/// Drives connection lifecycle events into the registry and broadcaster.
pub struct LifecycleController {
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
}

impl LifecycleController {
    pub fn new(registry: Arc<Registry>) -> Self {
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        Self {
            registry,
            broadcaster,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The transport signalled readiness: mark open and register.
    pub async fn on_open(&self, conn: &Arc<Connection>) -> Result<(), RegistryError> {
        conn.mark_open().await;
        self.registry.register(Arc::clone(conn)).await
    }

    /// An inbound frame arrived: decode and broadcast.
    ///
    /// A decode failure is returned for the caller to log; the frame is
    /// dropped, nothing is broadcast, and the connection stays open -
    /// malformed input from one peer must not disrupt others or itself.
    pub async fn on_message(
        &self,
        conn: &Arc<Connection>,
        raw: &str,
    ) -> Result<BroadcastReport, DecodeError> {
        let message = RelayMessage::parse(raw)?;
        let members = self.registry.size().await;
        tracing::debug!(
            connection_id = %conn.id(),
            members,
            "Relaying message"
        );
        Ok(self.broadcaster.broadcast(conn, &message).await)
    }

    /// The transport signalled close: mark closed and deregister.
    ///
    /// Idempotent; a second close for the same connection is a no-op.
    pub async fn on_close(&self, conn: &Arc<Connection>, code: u16, reason: &str) {
        if conn.mark_closed().await {
            tracing::info!(
                connection_id = %conn.id(),
                code,
                reason,
                "Connection closed"
            );
        }
        self.registry.deregister(conn.id()).await;
    }

    /// The transport reported an error: observed only.
    ///
    /// Error and close are independent transport signals and a transport
    /// may fire both; deregistration is driven strictly by the close path.
    pub async fn on_error(&self, conn: &Connection, error: &str) {
        tracing::error!(connection_id = %conn.id(), error, "Transport error");
    }
}

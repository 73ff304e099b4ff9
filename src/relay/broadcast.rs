//! Broadcast Engine
//!
//! Fans one decoded message out to every open connection in the registry,
//! including the sender. The relay is topology-agnostic: echo suppression,
//! if wanted, belongs to the message layer above it.

use std::sync::Arc;

use super::message::RelayMessage;
use super::registry::{Connection, ConnectionState, Registry};

/// Outcome of one broadcast pass, surfaced to the caller instead of being
/// buried in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Successful deliveries (channel accepted the frame).
    pub delivered: usize,
    /// Membership size at snapshot time.
    pub members: usize,
}

impl BroadcastReport {
    /// True when every snapshot member received the message.
    pub fn is_complete(&self) -> bool {
        self.delivered == self.members
    }
}

/// Delivers messages to the current registry membership.
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Broadcast a message to every open connection at snapshot time.
    ///
    /// The sender is included; the source relays its own messages back. A
    /// failed or non-open recipient is skipped and the pass continues - a
    /// delivery failure never aborts the broadcast and never deregisters
    /// the recipient, since membership is authoritative only from lifecycle
    /// close signals. The pass always runs to completion.
    pub async fn broadcast(&self, sender: &Connection, message: &RelayMessage) -> BroadcastReport {
        let snapshot = self.registry.snapshot().await;
        let text = message.to_text();

        let mut delivered = 0;
        for conn in &snapshot {
            if conn.state().await != ConnectionState::Open {
                tracing::debug!(
                    connection_id = %conn.id(),
                    "Recipient not open, skipped"
                );
                continue;
            }

            match conn.send(text.clone()) {
                Ok(()) => {
                    delivered += 1;
                    tracing::trace!(connection_id = %conn.id(), "Message queued");
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %conn.id(),
                        error = %e,
                        "Delivery failed, recipient skipped"
                    );
                }
            }
        }

        let report = BroadcastReport {
            delivered,
            members: snapshot.len(),
        };

        tracing::debug!(
            connection_id = %sender.id(),
            delivered = report.delivered,
            members = report.members,
            "Broadcast complete"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    async fn open_connection(
        registry: &Registry,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Connection::new(tx);
        conn.mark_open().await;
        registry.register(Arc::clone(&conn)).await.unwrap();
        (conn, rx)
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_including_sender() {
        let registry = Arc::new(Registry::new(16));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));

        let (a, mut rx_a) = open_connection(&registry).await;
        let (_b, mut rx_b) = open_connection(&registry).await;
        let (_c, mut rx_c) = open_connection(&registry).await;

        let message = RelayMessage::parse(r#"{"type":"offer","sdp":"x"}"#).unwrap();
        let report = broadcaster.broadcast(&a, &message).await;

        assert_eq!(report.delivered, 3);
        assert_eq!(report.members, 3);
        assert!(report.is_complete());

        for rx in [&mut rx_a, &mut rx_b, &mut rx_c] {
            let text = rx.try_recv().unwrap();
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value, json!({"type": "offer", "sdp": "x"}));
        }
        assert_eq!(registry.size().await, 3);
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_stop_the_pass() {
        let registry = Arc::new(Registry::new(16));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));

        let (a, mut rx_a) = open_connection(&registry).await;
        let (_b, rx_b) = open_connection(&registry).await;
        let (_c, mut rx_c) = open_connection(&registry).await;

        // b's pump is gone; its send fails mid-pass
        drop(rx_b);

        let message = RelayMessage::parse("{\"k\":1}").unwrap();
        let report = broadcaster.broadcast(&a, &message).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.members, 3);
        assert!(!report.is_complete());

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());

        // Delivery failure does not deregister
        assert_eq!(registry.size().await, 3);
    }

    #[tokio::test]
    async fn test_non_open_members_are_skipped() {
        let registry = Arc::new(Registry::new(16));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));

        let (a, mut rx_a) = open_connection(&registry).await;

        // Still connecting, not yet eligible
        let (tx, mut rx_pending) = mpsc::unbounded_channel();
        let pending = Connection::new(tx);
        registry.register(Arc::clone(&pending)).await.unwrap();

        let message = RelayMessage::parse("[1,2]").unwrap();
        let report = broadcaster.broadcast(&a, &message).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.members, 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_pending.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_per_sender_order_is_preserved_per_recipient() {
        let registry = Arc::new(Registry::new(16));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));

        let (a, _rx_a) = open_connection(&registry).await;
        let (_b, mut rx_b) = open_connection(&registry).await;

        let first = RelayMessage::parse(r#"{"seq":1}"#).unwrap();
        let second = RelayMessage::parse(r#"{"seq":2}"#).unwrap();
        broadcaster.broadcast(&a, &first).await;
        broadcaster.broadcast(&a, &second).await;

        assert_eq!(rx_b.try_recv().unwrap(), r#"{"seq":1}"#);
        assert_eq!(rx_b.try_recv().unwrap(), r#"{"seq":2}"#);
    }

    #[tokio::test]
    async fn test_broadcast_with_empty_registry() {
        let registry = Arc::new(Registry::new(16));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));

        // Sender already deregistered; the pass still completes
        let (tx, _rx) = mpsc::unbounded_channel();
        let sender = Connection::new(tx);
        sender.mark_open().await;

        let message = RelayMessage::parse("null").unwrap();
        let report = broadcaster.broadcast(&sender, &message).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.members, 0);
        assert!(report.is_complete());
    }
}

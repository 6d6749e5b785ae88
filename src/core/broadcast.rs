//! Delivery of envelopes to one or all registered connections
//!
//! Every send is isolated: a failing connection is pruned from the
//! registry and never affects delivery to the others.

use futures_util::future::join_all;
use log::{debug, error, warn};
use std::sync::Arc;

use crate::core::connection::Connection;
use crate::core::message::Envelope;
use crate::core::registry::ConnectionRegistry;

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver to exactly one connection; returns whether it was delivered
    pub async fn send(&self, envelope: &Envelope, connection: &Connection) -> bool {
        match envelope.to_json() {
            Ok(text) => self.deliver(&text, connection).await,
            Err(e) => {
                error!("Failed to serialize {:?} envelope: {}", envelope.kind, e);
                false
            }
        }
    }

    /// Deliver to every registered connection
    pub async fn broadcast(&self, envelope: &Envelope) -> BroadcastStats {
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize {:?} envelope: {}", envelope.kind, e);
                return BroadcastStats::default();
            }
        };

        let recipients = self.registry.snapshot().await;
        let results = join_all(
            recipients
                .iter()
                .map(|connection| self.deliver(&text, connection)),
        )
        .await;

        let delivered = results.iter().filter(|ok| **ok).count();
        let stats = BroadcastStats {
            recipients: recipients.len(),
            delivered,
            failed: recipients.len() - delivered,
        };
        debug!(
            "Broadcast {:?} to {} of {} clients",
            envelope.kind, stats.delivered, stats.recipients
        );
        stats
    }

    async fn deliver(&self, text: &str, connection: &Connection) -> bool {
        match connection.send_text(text).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send to client {}, pruning: {}", connection.id, e);
                self.registry.remove(&connection.id).await;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{ChannelSink, FrameSink};
    use crate::error::{AgentSyncError, Result};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct BrokenSink;

    #[async_trait]
    impl FrameSink for BrokenSink {
        async fn send_frame(&self, _frame: &str) -> Result<()> {
            Err(AgentSyncError::ConnectionError("socket reset".to_string()))
        }
    }

    fn healthy() -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Connection::new(Arc::new(ChannelSink::new(tx)))), rx)
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failed_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (conn, rx) = healthy();
            registry.add(conn).await;
            receivers.push(rx);
        }
        let broken = Arc::new(Connection::new(Arc::new(BrokenSink)));
        registry.add(broken.clone()).await;

        let stats = broadcaster.broadcast(&Envelope::pong()).await;

        assert_eq!(
            stats,
            BroadcastStats {
                recipients: 4,
                delivered: 3,
                failed: 1
            }
        );
        for rx in receivers.iter_mut() {
            let frame = rx.try_recv().unwrap();
            assert!(frame.contains("\"pong\""));
        }
        assert!(!registry.contains(&broken.id).await);
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_send_to_closed_channel_prunes_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let (conn, rx) = healthy();
        registry.add(conn.clone()).await;
        drop(rx);

        assert!(!broadcaster.send(&Envelope::pong(), &conn).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_send_preserves_order_per_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let (conn, mut rx) = healthy();
        registry.add(conn.clone()).await;

        broadcaster.send(&Envelope::error("first"), &conn).await;
        broadcaster.broadcast(&Envelope::error("second")).await;
        broadcaster.send(&Envelope::error("third"), &conn).await;

        for expected in ["first", "second", "third"] {
            assert!(rx.try_recv().unwrap().contains(expected));
        }
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_registry() {
        let broadcaster = Broadcaster::new(Arc::new(ConnectionRegistry::new()));
        let stats = broadcaster.broadcast(&Envelope::pong()).await;
        assert_eq!(stats, BroadcastStats::default());
    }
}

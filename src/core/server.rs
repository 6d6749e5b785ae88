//! Integrated server service that owns the shared state and connections

use log::info;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::broadcast::{BroadcastStats, Broadcaster};
use crate::core::message::Envelope;
use crate::core::processor::WorkProcessor;
use crate::core::protocol::ProtocolHandler;
use crate::core::registry::ConnectionRegistry;
use crate::core::session::{SessionEnd, SessionSupervisor};
use crate::core::state::{SharedState, StateStore};
use crate::core::transport::{FrameSink, FrameSource};

/// Wires the state store, registry, broadcaster and supervisor together.
///
/// One instance is shared by every connection task.
pub struct SyncServer {
    store: Arc<StateStore>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    supervisor: SessionSupervisor,
}

impl SyncServer {
    pub fn new(processor: Arc<dyn WorkProcessor>, max_frame_bytes: usize) -> Self {
        let store = Arc::new(StateStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        let handler = Arc::new(ProtocolHandler::new(
            store.clone(),
            broadcaster.clone(),
            processor,
            max_frame_bytes,
        ));
        let supervisor = SessionSupervisor::new(registry.clone(), handler);

        Self {
            store,
            registry,
            broadcaster,
            supervisor,
        }
    }

    pub fn from_config(config: &ServerConfig, processor: Arc<dyn WorkProcessor>) -> Self {
        Self::new(processor, config.max_frame_bytes)
    }

    /// Serve one connection until it disconnects
    pub async fn accept<S>(&self, sink: Arc<dyn FrameSink>, source: S) -> SessionEnd
    where
        S: FrameSource,
    {
        self.supervisor.supervise(sink, source).await
    }

    /// Current state snapshot
    pub async fn state(&self) -> SharedState {
        self.store.read().await
    }

    /// Reset to idle with no actions and push the result to every client
    pub async fn reset(&self) -> (SharedState, BroadcastStats) {
        let mut stats = BroadcastStats::default();
        let delivered = &mut stats;
        let broadcaster = &self.broadcaster;
        let state = self
            .store
            .reset_then(|state| async move {
                *delivered = broadcaster.broadcast(&Envelope::state_update(state)).await;
            })
            .await;
        info!("Shared state reset");
        (state, stats)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }
}

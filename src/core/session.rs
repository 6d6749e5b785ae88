//! Session supervisor: the lifecycle of one accepted connection

use futures_util::FutureExt;
use log::{error, info};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::core::connection::Connection;
use crate::core::protocol::ProtocolHandler;
use crate::core::registry::ConnectionRegistry;
use crate::core::transport::{FrameSink, FrameSource};
use crate::error::{panic_message, AgentSyncError};

/// How a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// The peer closed the transport
    Closed,
    /// Transport failure or a fault inside the handler loop
    Failed(AgentSyncError),
}

pub struct SessionSupervisor {
    registry: Arc<ConnectionRegistry>,
    handler: Arc<ProtocolHandler>,
}

impl SessionSupervisor {
    pub fn new(registry: Arc<ConnectionRegistry>, handler: Arc<ProtocolHandler>) -> Self {
        Self { registry, handler }
    }

    /// Register, run the protocol loop until disconnect, then unregister.
    ///
    /// Errors and panics from the loop end only this session.
    pub async fn supervise<S>(&self, sink: Arc<dyn FrameSink>, mut source: S) -> SessionEnd
    where
        S: FrameSource,
    {
        let connection = Arc::new(Connection::new(sink));
        let client_id = connection.id.clone();

        self.registry.add(connection.clone()).await;
        info!("Client connected: {}", client_id);
        info!("Current connections: {}", self.registry.len().await);

        let handler = self.handler.clone();
        let conn = connection.clone();
        let session = async move {
            handler.on_connect(&conn).await;
            handler.run(&conn, &mut source).await
        };

        let end = match AssertUnwindSafe(session).catch_unwind().await {
            Ok(Ok(())) => SessionEnd::Closed,
            Ok(Err(e)) => {
                error!("Connection {} failed: {}", client_id, e);
                SessionEnd::Failed(e)
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!("Handler for {} panicked: {}", client_id, reason);
                SessionEnd::Failed(AgentSyncError::SystemError(reason))
            }
        };

        self.registry.remove(&client_id).await;
        info!(
            "Client disconnected: {} after {:?}",
            client_id,
            connection.connection_duration()
        );
        info!("Current connections: {}", self.registry.len().await);

        end
    }
}

//! Client connection handle
//! Identity plus the outbound half of the transport

use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::core::transport::FrameSink;
use crate::error::Result;

/// Represents a single open client connection
pub struct Connection {
    pub id: String,
    sink: Arc<dyn FrameSink>,
    pub connected_at: Instant,
}

impl Connection {
    /// Create a new connection with a unique ID
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), sink)
    }

    pub fn with_id(id: String, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            id,
            sink,
            connected_at: Instant::now(),
        }
    }

    /// Send a text frame through this connection
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.sink.send_frame(text).await
    }

    /// Calculate the connection duration
    pub fn connection_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

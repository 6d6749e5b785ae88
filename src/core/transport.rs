//! Transport abstraction used by the protocol core
//!
//! The core never touches a socket directly. A transport hands it a
//! [`FrameSource`] for inbound frames and a [`FrameSink`] for outbound ones;
//! the warp adapter lives in `handlers::websocket`.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{AgentSyncError, Result};

/// One inbound transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Binary or control frames the protocol does not interpret
    Other,
    Closed,
}

/// Receiving half of a connection
#[async_trait]
pub trait FrameSource: Send {
    async fn receive_frame(&mut self) -> Result<Frame>;
}

/// Sending half of a connection
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_frame(&self, frame: &str) -> Result<()>;
}

/// Sink backed by an unbounded channel drained by a writer task.
///
/// Frames are queued in call order, so per-connection ordering holds.
/// Sending fails once the writer has gone away.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send_frame(&self, frame: &str) -> Result<()> {
        self.sender
            .send(frame.to_string())
            .map_err(|_| AgentSyncError::ConnectionClosed)
    }
}

// In-process source; a dropped sender reads as a closed connection
#[async_trait]
impl FrameSource for mpsc::UnboundedReceiver<Frame> {
    async fn receive_frame(&mut self) -> Result<Frame> {
        Ok(self.recv().await.unwrap_or(Frame::Closed))
    }
}

use async_trait::async_trait;
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitStream, StreamExt};
use log::{debug, error};
use std::sync::Arc;
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::core::server::SyncServer;
use crate::core::session::SessionEnd;
use crate::core::transport::{ChannelSink, Frame, FrameSource};
use crate::error::{AgentSyncError, Result};

/// Inbound half of a warp WebSocket
pub struct WarpFrameSource {
    stream: SplitStream<WebSocket>,
}

impl WarpFrameSource {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl FrameSource for WarpFrameSource {
    async fn receive_frame(&mut self) -> Result<Frame> {
        match self.stream.next().await {
            None => Ok(Frame::Closed),
            Some(Err(e)) => Err(AgentSyncError::ConnectionError(e.to_string())),
            Some(Ok(msg)) if msg.is_close() => Ok(Frame::Closed),
            Some(Ok(msg)) => match msg.to_str() {
                Ok(text) => Ok(Frame::Text(text.to_string())),
                Err(()) => Ok(Frame::Other),
            },
        }
    }
}

// Handle a WebSocket connection
pub async fn handle_ws_client(ws: WebSocket, server: Arc<SyncServer>) {
    let (mut ws_tx, ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Spawn a task to forward frames from our channel to the WebSocket
    tokio::task::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_tx.send(Message::text(text)).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let sink = Arc::new(ChannelSink::new(tx));
    match server.accept(sink, WarpFrameSource::new(ws_rx)).await {
        SessionEnd::Closed => debug!("WebSocket closed by peer"),
        SessionEnd::Failed(e) => debug!("WebSocket session ended with error: {}", e),
    }
}

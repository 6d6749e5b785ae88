//! Per-connection protocol loop
//!
//! Frames from one connection are handled strictly in arrival order: a work
//! request runs to completion (processing, completion or failure, and the
//! matching broadcasts) before the next frame is read.

use futures_util::FutureExt;
use log::{debug, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::core::broadcast::Broadcaster;
use crate::core::connection::Connection;
use crate::core::message::{Envelope, Inbound};
use crate::core::processor::WorkProcessor;
use crate::core::state::{SharedState, StateStore};
use crate::core::transport::{Frame, FrameSource};
use crate::error::{panic_message, AgentSyncError, Result};

pub struct ProtocolHandler {
    store: Arc<StateStore>,
    broadcaster: Arc<Broadcaster>,
    processor: Arc<dyn WorkProcessor>,
    max_frame_bytes: usize,
}

impl ProtocolHandler {
    pub fn new(
        store: Arc<StateStore>,
        broadcaster: Arc<Broadcaster>,
        processor: Arc<dyn WorkProcessor>,
        max_frame_bytes: usize,
    ) -> Self {
        Self {
            store,
            broadcaster,
            processor,
            max_frame_bytes,
        }
    }

    /// Greet a new connection with the current state
    pub async fn on_connect(&self, connection: &Connection) {
        let broadcaster = &self.broadcaster;
        self.store
            .read_then(|state| async move {
                broadcaster
                    .send(&Envelope::state_update(state), connection)
                    .await;
            })
            .await;
    }

    /// Read and dispatch frames until the transport closes.
    ///
    /// Returns an error only for transport failures.
    pub async fn run<S>(&self, connection: &Connection, source: &mut S) -> Result<()>
    where
        S: FrameSource + ?Sized,
    {
        loop {
            match source.receive_frame().await? {
                Frame::Text(text) => self.handle_text(connection, &text).await,
                Frame::Other => debug!("Ignoring non-text frame from {}", connection.id),
                Frame::Closed => return Ok(()),
            }
        }
    }

    /// Classify one text frame and act on it
    pub async fn handle_text(&self, connection: &Connection, text: &str) {
        match Inbound::parse(text, self.max_frame_bytes) {
            Ok(Inbound::Ping) => {
                debug!("Ping from {}", connection.id);
                self.broadcaster.send(&Envelope::pong(), connection).await;
            }
            Ok(Inbound::WorkRequest(message)) => {
                self.handle_work_request(connection, &message).await;
            }
            Err(e) => {
                warn!("Malformed frame from {}: {}", connection.id, e);
                self.broadcaster
                    .send(&Envelope::error(e.client_message()), connection)
                    .await;
            }
        }
    }

    async fn handle_work_request(&self, connection: &Connection, message: &str) {
        info!("Work request from {} ({} bytes)", connection.id, message.len());

        self.transition_and_broadcast(|state| state.processing())
            .await;

        let result = match AssertUnwindSafe(self.processor.process(message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(AgentSyncError::ProcessingError(format!(
                "Work processor panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        match result {
            Ok(action) => {
                debug!("Work request from {} produced action {}", connection.id, action.id);
                self.transition_and_broadcast(move |state| state.completed_with(action))
                    .await;
            }
            Err(e) => {
                warn!("Work request from {} failed: {}", connection.id, e);
                let description = e.client_message();
                self.transition_and_broadcast(move |state| state.failed(description))
                    .await;
            }
        }
    }

    // Broadcast while the transition still holds the store, so clients see
    // states in the order they were produced
    async fn transition_and_broadcast<F>(&self, f: F) -> SharedState
    where
        F: FnOnce(SharedState) -> SharedState,
    {
        let broadcaster = &self.broadcaster;
        self.store
            .transition_then(f, |next| async move {
                broadcaster.broadcast(&Envelope::state_update(next)).await;
            })
            .await
    }
}

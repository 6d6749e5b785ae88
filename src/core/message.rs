//! Wire envelopes exchanged with clients

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::state::SharedState;
use crate::error::{AgentSyncError, Result};

/// Current unix time in fractional seconds
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    StateUpdate,
    WorkRequest,
    Error,
    Ping,
    Pong,
}

/// Outbound payloads: a full state snapshot or an error description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    State(SharedState),
    Error { message: String },
}

/// Wire-level message wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    pub timestamp: f64,
}

impl Envelope {
    pub fn state_update(state: SharedState) -> Self {
        Self {
            kind: MessageType::StateUpdate,
            payload: Some(Payload::State(state)),
            timestamp: unix_timestamp(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: MessageType::Error,
            payload: Some(Payload::Error {
                message: message.into(),
            }),
            timestamp: unix_timestamp(),
        }
    }

    pub fn pong() -> Self {
        Self {
            kind: MessageType::Pong,
            payload: None,
            timestamp: unix_timestamp(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// State carried by a `state_update`, if any
    pub fn state(&self) -> Option<&SharedState> {
        match &self.payload {
            Some(Payload::State(state)) => Some(state),
            _ => None,
        }
    }
}

/// Frames a client may send
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Ping,
    WorkRequest { payload: WorkRequestPayload },
}

#[derive(Debug, Deserialize)]
struct WorkRequestPayload {
    #[serde(default)]
    message: String,
}

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Ping,
    WorkRequest(String),
}

impl Inbound {
    /// Classify one text frame, rejecting anything outside the protocol
    pub fn parse(text: &str, max_bytes: usize) -> Result<Self> {
        if text.len() > max_bytes {
            return Err(AgentSyncError::MessageTooLarge(text.len()));
        }

        let value: Value = serde_json::from_str(text)
            .map_err(|_| AgentSyncError::MessageParseError("Invalid JSON format".to_string()))?;

        let frame: ClientFrame = serde_json::from_value(value).map_err(|e| {
            AgentSyncError::MessageParseError(format!("Unsupported message: {}", e))
        })?;

        match frame {
            ClientFrame::Ping => Ok(Inbound::Ping),
            ClientFrame::WorkRequest { payload } if payload.message.is_empty() => {
                Err(AgentSyncError::EmptyWorkRequest)
            }
            ClientFrame::WorkRequest { payload } => Ok(Inbound::WorkRequest(payload.message)),
        }
    }
}

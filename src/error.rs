use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum AgentSyncError {
    // Connections errors
    ConnectionError(String),
    ConnectionClosed,

    // Messages errors
    MessageParseError(String),
    MessageTooLarge(usize),
    EmptyWorkRequest,
    SerializationError(String),

    // Work processor errors
    ProcessingError(String),

    // System errors
    SystemError(String),

    // Configuration errors
    ConfigError(String),
}

impl AgentSyncError {
    /// Text sent to clients inside an `error` envelope
    pub fn client_message(&self) -> String {
        match self {
            Self::MessageParseError(msg) => msg.clone(),
            Self::MessageTooLarge(size) => format!("Message too large: {} bytes", size),
            Self::EmptyWorkRequest => "Work request message must not be empty".to_string(),
            Self::ProcessingError(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AgentSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            Self::ConnectionClosed => write!(f, "Connection closed unexpectedly"),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::MessageTooLarge(size) => write!(f, "Message too large: {} bytes", size),
            Self::EmptyWorkRequest => write!(f, "Work request message must not be empty"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Self::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            Self::SystemError(msg) => write!(f, "System error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for AgentSyncError {}

impl From<serde_json::Error> for AgentSyncError {
    fn from(err: serde_json::Error) -> Self {
        AgentSyncError::SerializationError(err.to_string())
    }
}

/// Readable text from a caught panic payload
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// Generic result type for the crate
pub type Result<T> = std::result::Result<T, AgentSyncError>;

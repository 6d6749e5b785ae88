//! Core functionality for the agent sync server

pub mod broadcast;
pub mod connection;
pub mod message;
pub mod processor;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod state;
pub mod transport;

// Re-export main components for convenience
pub use broadcast::{BroadcastStats, Broadcaster};
pub use connection::Connection;
pub use message::{Envelope, Inbound, MessageType, Payload};
pub use processor::{PreviewProcessor, WorkProcessor};
pub use protocol::ProtocolHandler;
pub use registry::ConnectionRegistry;
pub use server::SyncServer;
pub use session::{SessionEnd, SessionSupervisor};
pub use state::{Action, ActionKind, SharedState, StateStore, Status};
pub use transport::{ChannelSink, Frame, FrameSink, FrameSource};

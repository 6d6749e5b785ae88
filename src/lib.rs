//! Agent Sync - real-time agent state synchronization over WebSocket
//!
//! This library provides the connection management and state
//! synchronization layer: a single shared state object mutated one
//! transition at a time and broadcast to every connected client.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;

// Re-export main components
pub use config::*;
pub use constants::*;

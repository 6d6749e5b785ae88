//! Request handlers for different server endpoints

pub mod http;
pub mod websocket;

// Re-export the entry points
pub use http::routes;
pub use websocket::handle_ws_client;

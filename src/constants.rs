// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

// WebSocket endpoint is served at /ws/agent
pub const WS_PATH_PREFIX: &str = "ws";
pub const WS_PATH: &str = "agent";

// Largest inbound text frame accepted before it is treated as malformed
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

// Characters of the user message echoed back by the preview processor
pub const PREVIEW_EXCERPT_CHARS: usize = 100;

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

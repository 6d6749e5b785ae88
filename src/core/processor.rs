//! Work processor collaborator
//!
//! Turns one user message into one [`Action`]. Latency and failure are the
//! processor's business; the protocol core only awaits the result.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::constants::PREVIEW_EXCERPT_CHARS;
use crate::core::state::{Action, ActionKind};
use crate::error::Result;

#[async_trait]
pub trait WorkProcessor: Send + Sync {
    /// Produce exactly one action, or a `ProcessingError` describing the fault
    async fn process(&self, message: &str) -> Result<Action>;
}

/// Built-in processor used when no reasoning backend is configured.
///
/// Renders a card that echoes the request back.
#[derive(Debug, Clone, Default)]
pub struct PreviewProcessor;

impl PreviewProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WorkProcessor for PreviewProcessor {
    async fn process(&self, message: &str) -> Result<Action> {
        let excerpt: String = message.chars().take(PREVIEW_EXCERPT_CHARS).collect();

        let mut props = Map::new();
        props.insert("title".to_string(), Value::from("Agent Response"));
        props.insert(
            "description".to_string(),
            Value::from(format!("Received message: {}...", excerpt)),
        );

        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::from("preview"));

        Ok(Action::new(ActionKind::Render)
            .with_component("card")
            .with_props(props)
            .with_content(json!({
                "message": "No reasoning backend is configured. This is a preview response.",
                "original_message": message,
            }))
            .with_metadata(metadata))
    }
}

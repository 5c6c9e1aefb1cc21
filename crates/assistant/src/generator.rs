use async_trait::async_trait;
use serde::Serialize;

use crate::{AssistantResult, Prompt};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub content: String,
    /// The lead asked for a person or a viewing.
    pub handoff: bool,
    /// Public ids of listings mentioned in the reply.
    pub listing_ids: Vec<String>,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            handoff: false,
            listing_ids: Vec::new(),
        }
    }
}

/// Produces the assistant's next message for a prompt.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> AssistantResult<Reply>;
}

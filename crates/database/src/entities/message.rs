//! Chat message entity definitions

use serde::{Deserialize, Serialize};

text_enum! {
    MessageSender {
        Lead => "lead",
        Agent => "agent",
        Assistant => "assistant",
        System => "system",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub public_id: String,
    pub conversation_id: i64,
    pub sender: MessageSender,
    pub sender_user_id: Option<i64>,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender: MessageSender,
    pub sender_user_id: Option<i64>,
    pub content: String,
}

impl NewMessage {
    pub fn new(sender: MessageSender, content: impl Into<String>) -> Self {
        Self {
            sender,
            sender_user_id: None,
            content: content.into(),
        }
    }

    pub fn from_agent(user_id: i64, content: impl Into<String>) -> Self {
        Self {
            sender: MessageSender::Agent,
            sender_user_id: Some(user_id),
            content: content.into(),
        }
    }
}

/// Characters of a message kept as the conversation preview.
pub const PREVIEW_CHARS: usize = 140;

pub fn preview(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(PREVIEW_CHARS - 1).collect();
    cut.push('…');
    cut
}

//! Chat conversation entity definitions

use serde::{Deserialize, Serialize};

text_enum! {
    ConversationStatus {
        Open => "open",
        Closed => "closed",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub public_id: String,
    pub lead_id: i64,
    pub status: ConversationStatus,
    pub assistant_enabled: bool,
    pub last_message_id: Option<i64>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<String>,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Conversation {
    pub fn is_open(&self) -> bool {
        self.status == ConversationStatus::Open
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationFilter {
    pub status: Option<ConversationStatus>,
    pub lead_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

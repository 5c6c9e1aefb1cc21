//! Assistant used by the chat widget: prompt assembly plus a pluggable
//! reply generator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod generator;
mod listing_assistant;
mod prompt;

pub use generator::{Reply, ReplyGenerator};
pub use listing_assistant::ListingAssistant;
pub use prompt::{Prompt, PromptBuilder};

pub type AssistantResult<T> = Result<T, AssistantError>;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("prompt contains no user message")]
    EmptyPrompt,
    #[error("reply generation failed: {0}")]
    Generation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// Compact view of a public listing handed to the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub public_id: String,
    pub slug: String,
    pub title: String,
    pub city: String,
    /// `house`, `apartment`, ...
    pub property_type: String,
    /// `sale` or `rent`.
    pub listing_type: String,
    pub price: i64,
    pub currency: String,
    pub bedrooms: i64,
    pub bathrooms: f64,
    pub featured: bool,
}

impl ListingSummary {
    pub fn is_rental(&self) -> bool {
        self.listing_type == "rent"
    }

    /// One line used in prompts and replies.
    pub fn describe(&self) -> String {
        let period = if self.is_rental() { "/month" } else { "" };
        format!(
            "{} in {}: {} {}{}, {} bd / {} ba ({})",
            self.title,
            self.city,
            self.currency,
            group_thousands(self.price),
            period,
            self.bedrooms,
            self.bathrooms,
            self.property_type,
        )
    }
}

pub(crate) fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

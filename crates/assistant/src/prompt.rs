use realty_config::AssistantConfig;
use serde::Serialize;

use crate::{ChatRole, ChatTurn, ListingSummary};

/// Everything a generator needs for one reply.
#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub system: String,
    pub turns: Vec<ChatTurn>,
    pub listings: Vec<ListingSummary>,
    pub assistant_name: String,
    pub agency_name: String,
}

impl Prompt {
    pub fn latest_user_turn(&self) -> Option<&ChatTurn> {
        self.turns.iter().rev().find(|turn| turn.role == ChatRole::User)
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    assistant_name: String,
    agency_name: String,
    history_limit: usize,
}

impl PromptBuilder {
    pub fn new(config: &AssistantConfig, agency_name: impl Into<String>) -> Self {
        Self {
            assistant_name: config.name.clone(),
            agency_name: agency_name.into(),
            history_limit: config.history_limit.max(1),
        }
    }

    /// Assemble the prompt from the conversation so far (oldest first).
    ///
    /// Only the last `history_limit` turns are kept. Blank turns are dropped
    /// and runs of turns from the same role are merged into one.
    pub fn build(&self, history: &[ChatTurn], listings: Vec<ListingSummary>) -> Prompt {
        let start = history.len().saturating_sub(self.history_limit);

        let mut turns: Vec<ChatTurn> = Vec::new();
        for turn in &history[start..] {
            let content = turn.content.trim();
            if content.is_empty() {
                continue;
            }
            match turns.last_mut() {
                Some(previous) if previous.role == turn.role => {
                    previous.content.push_str("\n\n");
                    previous.content.push_str(content);
                }
                _ => turns.push(ChatTurn {
                    role: turn.role,
                    content: content.to_string(),
                }),
            }
        }

        Prompt {
            system: self.system_preamble(&listings),
            turns,
            listings,
            assistant_name: self.assistant_name.clone(),
            agency_name: self.agency_name.clone(),
        }
    }

    fn system_preamble(&self, listings: &[ListingSummary]) -> String {
        let mut preamble = format!(
            "You are {}, the virtual assistant for {}. Help visitors find properties, \
             answer questions about listings and offer to arrange a viewing with an agent. \
             Only recommend listings from the catalog below.",
            self.assistant_name, self.agency_name
        );

        preamble.push_str("\n\nCatalog:");
        if listings.is_empty() {
            preamble.push_str("\n(no listings currently available)");
        }
        for listing in listings {
            preamble.push_str("\n- ");
            preamble.push_str(&listing.describe());
            preamble.push_str(&format!(" [/properties/{}]", listing.slug));
        }
        preamble
    }
}

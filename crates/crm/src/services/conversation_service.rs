//! Lead chat conversations and the assistant that answers them.

use std::sync::Arc;

use realty_assistant::{ChatTurn, PromptBuilder, ReplyGenerator};
use realty_catalog::PropertyService;
use realty_config::AssistantConfig;
use realty_database::{
    Conversation, ConversationFilter, ConversationRepository, ConversationStatus, Lead,
    LeadRepository, LeadStatus, Message, MessageRepository, MessageSender, NewMessage, Page, User,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{CrmError, CrmResult};
use crate::services::CrmConfigService;

const MAX_MESSAGE_CHARS: usize = 4000;
/// Public listings handed to the assistant per reply.
const ASSISTANT_CATALOG_SIZE: i64 = 50;

/// What happened after a lead posted a message.
#[derive(Debug, Clone, Serialize)]
pub struct LeadMessageOutcome {
    pub message: Message,
    /// `None` when the assistant is off or could not answer.
    pub reply: Option<Message>,
    pub handoff: bool,
}

fn clean_content(content: &str) -> CrmResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CrmError::validation("message must not be empty"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(CrmError::validation("message is too long"));
    }
    Ok(content.to_string())
}

fn to_turn(message: &Message) -> ChatTurn {
    match message.sender {
        MessageSender::Lead => ChatTurn::user(&message.content),
        MessageSender::Agent | MessageSender::Assistant => ChatTurn::assistant(&message.content),
        MessageSender::System => ChatTurn::system(&message.content),
    }
}

#[derive(Clone)]
pub struct ConversationService {
    conversations: ConversationRepository,
    messages: MessageRepository,
    leads: LeadRepository,
    properties: PropertyService,
    settings: CrmConfigService,
    generator: Arc<dyn ReplyGenerator>,
    assistant: AssistantConfig,
}

impl ConversationService {
    pub fn new(
        pool: SqlitePool,
        settings: CrmConfigService,
        generator: Arc<dyn ReplyGenerator>,
        assistant: AssistantConfig,
    ) -> Self {
        Self {
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            leads: LeadRepository::new(pool.clone()),
            properties: PropertyService::new(pool),
            settings,
            generator,
            assistant,
        }
    }

    /// The lead's open conversation, or a new one opened with the greeting.
    pub async fn open_for_lead(&self, lead: &Lead) -> CrmResult<Conversation> {
        if let Some(existing) = self.conversations.find_open_for_lead(lead.id).await? {
            return Ok(existing);
        }

        let settings = self.settings.get().await?;
        let greeting = settings
            .assistant_greeting
            .filter(|g| !g.trim().is_empty())
            .unwrap_or_else(|| self.assistant.greeting.clone());
        let (conversation, _) = self
            .conversations
            .create_with_greeting(
                lead.id,
                settings.assistant_enabled,
                &NewMessage::new(MessageSender::Assistant, greeting),
            )
            .await?;

        info!(conversation = %conversation.public_id, lead = %lead.public_id, "opened conversation");
        Ok(conversation)
    }

    pub async fn get(&self, public_id: &str) -> CrmResult<Conversation> {
        self.conversations
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| CrmError::not_found("conversation"))
    }

    /// Record a lead message and, when enabled, the assistant's answer.
    pub async fn post_lead_message(&self, public_id: &str, content: &str) -> CrmResult<LeadMessageOutcome> {
        let content = clean_content(content)?;
        let conversation = self.get(public_id).await?;
        if !conversation.is_open() {
            return Err(CrmError::ConversationClosed);
        }

        let message = self
            .messages
            .append(conversation.id, &NewMessage::new(MessageSender::Lead, content))
            .await?;

        let settings = self.settings.get().await?;
        if !(conversation.assistant_enabled && settings.assistant_enabled) {
            debug!(conversation = %conversation.public_id, "assistant disabled, waiting for an agent");
            return Ok(LeadMessageOutcome {
                message,
                reply: None,
                handoff: false,
            });
        }

        match self.assistant_reply(&conversation, &settings.agency_name).await {
            Ok((reply, handoff)) => Ok(LeadMessageOutcome {
                message,
                reply: Some(reply),
                handoff,
            }),
            Err(err) => {
                warn!(conversation = %conversation.public_id, error = %err, "assistant reply failed");
                Ok(LeadMessageOutcome {
                    message,
                    reply: None,
                    handoff: false,
                })
            }
        }
    }

    async fn assistant_reply(&self, conversation: &Conversation, agency_name: &str) -> CrmResult<(Message, bool)> {
        let history = self
            .messages
            .recent(conversation.id, self.assistant.history_limit as i64)
            .await?;
        let turns: Vec<ChatTurn> = history.iter().map(to_turn).collect();
        let listings = self.properties.listing_summaries(ASSISTANT_CATALOG_SIZE).await?;

        let prompt = PromptBuilder::new(&self.assistant, agency_name).build(&turns, listings);
        let reply = self.generator.generate(&prompt).await?;

        let stored = self
            .messages
            .append(conversation.id, &NewMessage::new(MessageSender::Assistant, reply.content))
            .await?;

        if reply.handoff {
            self.escalate(conversation).await?;
        }
        Ok((stored, reply.handoff))
    }

    /// A lead asking for a person is at least `contacted`.
    async fn escalate(&self, conversation: &Conversation) -> CrmResult<()> {
        let Some(lead) = self.leads.find_by_id(conversation.lead_id).await? else {
            return Ok(());
        };
        if lead.status == LeadStatus::New {
            self.leads
                .move_on_board(lead.id, LeadStatus::Contacted, i64::MAX)
                .await?;
            info!(lead = %lead.public_id, "lead asked for an agent");
        }
        Ok(())
    }

    /// An agent reply takes the conversation over from the assistant.
    pub async fn post_agent_message(&self, public_id: &str, agent: &User, content: &str) -> CrmResult<Message> {
        let content = clean_content(content)?;
        let conversation = self.get(public_id).await?;
        if !conversation.is_open() {
            return Err(CrmError::ConversationClosed);
        }

        let message = self
            .messages
            .append(conversation.id, &NewMessage::from_agent(agent.id, content))
            .await?;
        if conversation.assistant_enabled {
            self.conversations.set_assistant_enabled(conversation.id, false).await?;
            info!(conversation = %conversation.public_id, agent = %agent.public_id, "agent took over conversation");
        }
        Ok(message)
    }

    pub async fn set_assistant_enabled(&self, public_id: &str, enabled: bool) -> CrmResult<Conversation> {
        let mut conversation = self.get(public_id).await?;
        self.conversations.set_assistant_enabled(conversation.id, enabled).await?;
        conversation.assistant_enabled = enabled;
        Ok(conversation)
    }

    pub async fn close(&self, public_id: &str) -> CrmResult<Conversation> {
        self.set_status(public_id, ConversationStatus::Closed).await
    }

    pub async fn reopen(&self, public_id: &str) -> CrmResult<Conversation> {
        self.set_status(public_id, ConversationStatus::Open).await
    }

    async fn set_status(&self, public_id: &str, status: ConversationStatus) -> CrmResult<Conversation> {
        let mut conversation = self.get(public_id).await?;
        if conversation.status != status {
            self.conversations.set_status(conversation.id, status).await?;
            info!(conversation = %conversation.public_id, status = %status, "conversation status changed");
            conversation.status = status;
        }
        Ok(conversation)
    }

    pub async fn list(&self, filter: ConversationFilter) -> CrmResult<Page<Conversation>> {
        Ok(self.conversations.list(&filter).await?)
    }

    /// Oldest first.
    pub async fn messages(&self, conversation: &Conversation) -> CrmResult<Vec<Message>> {
        Ok(self.messages.list_for_conversation(conversation.id).await?)
    }

    pub async fn count_open(&self) -> CrmResult<i64> {
        Ok(self.conversations.count_open().await?)
    }
}

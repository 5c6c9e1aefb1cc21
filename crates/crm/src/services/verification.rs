//! Email verification in front of the lead chat.
//!
//! A visitor requests a code, proves they own the address, and gets back a
//! lead token scoped to their conversation.

use realty_auth::{AuthError, LeadToken, LeadTokenIssuer};
use realty_database::{Conversation, Lead, Message};
use serde::Serialize;
use tracing::info;

use crate::error::{CrmError, CrmResult};
use crate::services::lead_service::clean_name;
use crate::services::{ConversationService, LeadService, OtpIssued, OtpService};

/// A token naming a deleted lead or conversation is just an invalid token.
fn token_target_missing(error: CrmError) -> CrmError {
    match error {
        CrmError::NotFound(_) => AuthError::InvalidLeadToken.into(),
        other => other,
    }
}

/// Everything the chat widget needs after a successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedLead {
    pub token: LeadToken,
    pub lead: Lead,
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

#[derive(Clone)]
pub struct LeadVerificationFlow {
    otp: OtpService,
    leads: LeadService,
    conversations: ConversationService,
    tokens: LeadTokenIssuer,
}

impl LeadVerificationFlow {
    pub fn new(
        otp: OtpService,
        leads: LeadService,
        conversations: ConversationService,
        tokens: LeadTokenIssuer,
    ) -> Self {
        Self {
            otp,
            leads,
            conversations,
            tokens,
        }
    }

    pub async fn request_code(&self, name: Option<&str>, email: &str) -> CrmResult<OtpIssued> {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            clean_name(name)?;
        }
        self.otp.issue(email).await
    }

    pub async fn verify_code(
        &self,
        email: &str,
        code: &str,
        name: Option<&str>,
        phone: Option<String>,
    ) -> CrmResult<VerifiedLead> {
        self.otp.verify(email, code).await?;

        let lead = self.leads.find_or_create_verified(name, email, phone).await?;
        let conversation = self.conversations.open_for_lead(&lead).await?;
        let token = self.tokens.mint(&lead.public_id, &conversation.public_id)?;
        let messages = self.conversations.messages(&conversation).await?;

        info!(lead = %lead.public_id, conversation = %conversation.public_id, "lead verified, chat ready");
        Ok(VerifiedLead {
            token,
            lead,
            conversation,
            messages,
        })
    }

    /// Resolve a lead token to the lead and the conversation it grants.
    pub async fn authenticate(&self, token: &str) -> CrmResult<(Lead, Conversation)> {
        let claims = self.tokens.verify(token)?;
        let lead = self
            .leads
            .get(&claims.sub)
            .await
            .map_err(token_target_missing)?;
        let conversation = self
            .conversations
            .get(&claims.conversation)
            .await
            .map_err(token_target_missing)?;

        if conversation.lead_id != lead.id {
            return Err(AuthError::InvalidLeadToken.into());
        }
        Ok((lead, conversation))
    }
}

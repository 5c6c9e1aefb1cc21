//! Conversation endpoints for agents working the inbox

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use realty_database::{Conversation, ConversationFilter, ConversationStatus, Message};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::middleware::CurrentUser;
use crate::rest::leads::{LeadPresenter, LeadResponse};
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    /// lead, agent, assistant or system
    pub sender: String,
    pub content: String,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.public_id,
            sender: message.sender.to_string(),
            content: message.content,
            created_at: message.created_at,
        }
    }
}

pub(crate) fn message_responses(messages: Vec<Message>) -> Vec<MessageResponse> {
    messages.into_iter().map(MessageResponse::from).collect()
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: String,
    pub lead_id: String,
    /// open or closed
    pub status: String,
    pub assistant_enabled: bool,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<String>,
    pub message_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl ConversationResponse {
    pub(crate) fn new(conversation: Conversation, lead_id: String) -> Self {
        Self {
            id: conversation.public_id,
            lead_id,
            status: conversation.status.to_string(),
            assistant_enabled: conversation.assistant_enabled,
            last_message_preview: conversation.last_message_preview,
            last_message_at: conversation.last_message_at,
            message_count: conversation.message_count,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

async fn present(state: &GatewayState, conversation: Conversation) -> GatewayResult<ConversationResponse> {
    let lead_id = state
        .lead_public_id(conversation.lead_id)
        .await?
        .unwrap_or_default();
    Ok(ConversationResponse::new(conversation, lead_id))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationListResponse {
    pub items: Vec<ConversationResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationDetailResponse {
    pub conversation: ConversationResponse,
    pub lead: LeadResponse,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConversationQuery {
    #[param(value_type = Option<String>)]
    pub status: Option<ConversationStatus>,
    /// Public id of a lead.
    pub lead_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AgentMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssistantToggleRequest {
    pub enabled: bool,
}

pub fn create_conversation_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/dashboard/conversations", get(list_conversations))
        .route("/api/dashboard/conversations/:id", get(get_conversation))
        .route(
            "/api/dashboard/conversations/:id/messages",
            get(list_messages).post(post_agent_message),
        )
        .route("/api/dashboard/conversations/:id/assistant", put(set_assistant))
        .route("/api/dashboard/conversations/:id/close", post(close_conversation))
        .route("/api/dashboard/conversations/:id/reopen", post(reopen_conversation))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/conversations",
    tag = "Conversations",
    security(("bearerAuth" = [])),
    params(ConversationQuery),
    responses(
        (status = 200, description = "Conversations, most recently active first", body = ConversationListResponse),
        (status = 403, description = "Not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_conversations(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ConversationQuery>,
) -> GatewayResult<Json<ConversationListResponse>> {
    current.require_lead_access()?;

    let lead_id = match query.lead_id.as_deref() {
        Some(public_id) => Some(state.lead_row_id(public_id).await?),
        None => None,
    };
    let page = state
        .crm
        .conversations
        .list(ConversationFilter {
            status: query.status,
            lead_id,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;

    let mut leads: HashMap<i64, String> = HashMap::new();
    let mut items = Vec::with_capacity(page.items.len());
    for conversation in page.items {
        let lead_id = match leads.get(&conversation.lead_id) {
            Some(public_id) => public_id.clone(),
            None => {
                let public_id = state
                    .lead_public_id(conversation.lead_id)
                    .await?
                    .unwrap_or_default();
                leads.insert(conversation.lead_id, public_id.clone());
                public_id
            }
        };
        items.push(ConversationResponse::new(conversation, lead_id));
    }

    Ok(Json(ConversationListResponse {
        items,
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/conversations/{id}",
    tag = "Conversations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Conversation public ID")),
    responses(
        (status = 200, description = "Conversation with its lead and transcript", body = ConversationDetailResponse),
        (status = 404, description = "Conversation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<ConversationDetailResponse>> {
    current.require_lead_access()?;

    let conversation = state.crm.conversations.get(&id).await?;
    let messages = state.crm.conversations.messages(&conversation).await?;
    let lead = state
        .crm
        .leads
        .find_by_id(conversation.lead_id)
        .await?
        .ok_or_else(|| GatewayError::not_found("lead not found"))?;

    let mut presenter = LeadPresenter::load(&state).await?;
    let lead_id = lead.public_id.clone();
    Ok(Json(ConversationDetailResponse {
        lead: presenter.present(&state, lead).await?,
        conversation: ConversationResponse::new(conversation, lead_id),
        messages: message_responses(messages),
    }))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/conversations/{id}/messages",
    tag = "Conversations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Conversation public ID")),
    responses(
        (status = 200, description = "Transcript, oldest first", body = MessagesResponse),
        (status = 404, description = "Conversation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<MessagesResponse>> {
    current.require_lead_access()?;

    let conversation = state.crm.conversations.get(&id).await?;
    let messages = state.crm.conversations.messages(&conversation).await?;
    Ok(Json(MessagesResponse {
        messages: message_responses(messages),
    }))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/conversations/{id}/messages",
    tag = "Conversations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Conversation public ID")),
    request_body = AgentMessageRequest,
    responses(
        (status = 200, description = "Agent reply stored; the assistant stands down", body = MessageResponse),
        (status = 400, description = "Empty message", body = crate::error::ErrorResponse),
        (status = 409, description = "Conversation is closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn post_agent_message(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<AgentMessageRequest>,
) -> GatewayResult<Json<MessageResponse>> {
    let agent = current.require_lead_access()?;

    let message = state
        .crm
        .conversations
        .post_agent_message(&id, agent, &req.content)
        .await?;
    Ok(Json(message.into()))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/conversations/{id}/assistant",
    tag = "Conversations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Conversation public ID")),
    request_body = AssistantToggleRequest,
    responses(
        (status = 200, description = "Assistant toggled", body = ConversationResponse),
        (status = 404, description = "Conversation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_assistant(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<AssistantToggleRequest>,
) -> GatewayResult<Json<ConversationResponse>> {
    let user = current.require_lead_access()?;

    let conversation = state
        .crm
        .conversations
        .set_assistant_enabled(&id, req.enabled)
        .await?;
    info!(user = %user.public_id, conversation = %conversation.public_id, enabled = req.enabled, "assistant toggled");
    Ok(Json(present(&state, conversation).await?))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/conversations/{id}/close",
    tag = "Conversations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Conversation public ID")),
    responses(
        (status = 200, description = "Conversation closed", body = ConversationResponse),
        (status = 404, description = "Conversation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn close_conversation(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<ConversationResponse>> {
    current.require_lead_access()?;
    let conversation = state.crm.conversations.close(&id).await?;
    Ok(Json(present(&state, conversation).await?))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/conversations/{id}/reopen",
    tag = "Conversations",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Conversation public ID")),
    responses(
        (status = 200, description = "Conversation reopened", body = ConversationResponse),
        (status = 404, description = "Conversation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn reopen_conversation(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<ConversationResponse>> {
    current.require_lead_access()?;
    let conversation = state.crm.conversations.reopen(&id).await?;
    Ok(Json(present(&state, conversation).await?))
}

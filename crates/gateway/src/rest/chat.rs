//! Chat widget endpoints: email verification, then a lead-token scoped conversation

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::LeadSession;
use crate::rest::conversations::{message_responses, ConversationResponse, MessageResponse};
use crate::state::GatewayState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpRequest {
    pub name: Option<String>,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OtpRequestResponse {
    pub success: bool,
    pub email: String,
    pub expires_at: String,
    /// Seconds before another code may be requested.
    pub resend_after_seconds: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub code: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// What the widget keeps about the visitor.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatLeadResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatSessionResponse {
    pub success: bool,
    /// Lead token. Send as `Authorization: Bearer <token>` on the chat endpoints.
    pub token: String,
    pub expires_at: String,
    pub lead: ChatLeadResponse,
    pub conversation: ConversationResponse,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatConversationResponse {
    pub conversation: ConversationResponse,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatMessageResponse {
    pub success: bool,
    pub message: MessageResponse,
    /// Absent when the assistant is off or could not answer.
    pub reply: Option<MessageResponse>,
    /// The lead asked for a person; an agent will follow up.
    pub handoff: bool,
}

/// Endpoints reachable before the visitor has a lead token.
pub fn create_otp_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/chat/otp/request", post(request_code))
        .route("/api/chat/otp/verify", post(verify_code))
}

/// Endpoints behind the lead-token middleware.
pub fn create_lead_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/chat/conversation", get(get_conversation))
        .route("/api/chat/messages", post(send_message))
}

#[utoipa::path(
    post,
    path = "/api/chat/otp/request",
    tag = "Chat",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code emailed", body = OtpRequestResponse),
        (status = 400, description = "Invalid email", body = crate::error::ErrorResponse),
        (status = 429, description = "Requested again too soon", body = crate::error::ErrorResponse)
    )
)]
pub async fn request_code(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<OtpRequest>,
) -> GatewayResult<Json<OtpRequestResponse>> {
    let issued = state
        .crm
        .verification
        .request_code(req.name.as_deref(), &req.email)
        .await?;

    Ok(Json(OtpRequestResponse {
        success: true,
        email: issued.email,
        expires_at: issued.expires_at,
        resend_after_seconds: issued.resend_after_seconds,
    }))
}

#[utoipa::path(
    post,
    path = "/api/chat/otp/verify",
    tag = "Chat",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Verified; lead token and conversation returned", body = ChatSessionResponse),
        (status = 400, description = "Wrong code or no code requested", body = crate::error::ErrorResponse),
        (status = 410, description = "Code expired or too many attempts", body = crate::error::ErrorResponse)
    )
)]
pub async fn verify_code(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<OtpVerifyRequest>,
) -> GatewayResult<Json<ChatSessionResponse>> {
    let verified = state
        .crm
        .verification
        .verify_code(&req.email, &req.code, req.name.as_deref(), req.phone)
        .await?;

    let lead_id = verified.lead.public_id.clone();
    Ok(Json(ChatSessionResponse {
        success: true,
        token: verified.token.token,
        expires_at: verified.token.expires_at,
        lead: ChatLeadResponse {
            id: verified.lead.public_id,
            name: verified.lead.name,
            email: verified.lead.email,
        },
        conversation: ConversationResponse::new(verified.conversation, lead_id),
        messages: message_responses(verified.messages),
    }))
}

#[utoipa::path(
    get,
    path = "/api/chat/conversation",
    operation_id = "get_lead_conversation",
    tag = "Chat",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The lead's conversation and transcript", body = ChatConversationResponse),
        (status = 401, description = "Missing or invalid lead token", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<GatewayState>>,
    Extension(session): Extension<LeadSession>,
) -> GatewayResult<Json<ChatConversationResponse>> {
    let messages = state.crm.conversations.messages(&session.conversation).await?;

    Ok(Json(ChatConversationResponse {
        conversation: ConversationResponse::new(session.conversation, session.lead.public_id),
        messages: message_responses(messages),
    }))
}

#[utoipa::path(
    post,
    path = "/api/chat/messages",
    tag = "Chat",
    security(("bearerAuth" = [])),
    request_body = ChatMessageRequest,
    responses(
        (status = 200, description = "Message stored, with the assistant's reply when it answered", body = ChatMessageResponse),
        (status = 400, description = "Empty or oversized message", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid lead token", body = crate::error::ErrorResponse),
        (status = 409, description = "Conversation is closed", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Extension(session): Extension<LeadSession>,
    Json(req): Json<ChatMessageRequest>,
) -> GatewayResult<Json<ChatMessageResponse>> {
    let outcome = state
        .crm
        .conversations
        .post_lead_message(&session.conversation.public_id, &req.content)
        .await?;

    Ok(Json(ChatMessageResponse {
        success: true,
        message: outcome.message.into(),
        reply: outcome.reply.map(MessageResponse::from),
        handoff: outcome.handoff,
    }))
}

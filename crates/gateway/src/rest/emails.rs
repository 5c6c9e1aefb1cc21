//! Outbox listing

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use realty_database::{Email, EmailFilter, EmailKind, EmailStatus};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct EmailResponse {
    pub id: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
    /// otp, lead_notification, lead_confirmation or generic
    pub kind: String,
    /// queued, sent or failed
    pub status: String,
    pub lead_id: Option<String>,
    /// Delivery error for failed emails.
    pub error: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
}

impl EmailResponse {
    fn new(email: Email, lead_id: Option<String>) -> Self {
        Self {
            id: email.public_id,
            to_address: email.to_address,
            subject: email.subject,
            body: email.body,
            kind: email.kind.to_string(),
            status: email.status.to_string(),
            lead_id,
            error: email.error,
            sent_at: email.sent_at,
            created_at: email.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmailListResponse {
    pub items: Vec<EmailResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailQuery {
    #[param(value_type = Option<String>)]
    pub kind: Option<EmailKind>,
    #[param(value_type = Option<String>)]
    pub status: Option<EmailStatus>,
    /// Public id of a lead.
    pub lead_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn create_email_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/api/dashboard/emails", get(list_emails))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/emails",
    tag = "Emails",
    security(("bearerAuth" = [])),
    params(EmailQuery),
    responses(
        (status = 200, description = "Outbox, newest first", body = EmailListResponse),
        (status = 403, description = "Not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_emails(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<EmailQuery>,
) -> GatewayResult<Json<EmailListResponse>> {
    current.require_lead_access()?;

    let lead_id = match query.lead_id.as_deref() {
        Some(public_id) => Some(state.lead_row_id(public_id).await?),
        None => None,
    };
    let page = state
        .crm
        .emails
        .list(EmailFilter {
            kind: query.kind,
            status: query.status,
            lead_id,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;

    let mut items = Vec::with_capacity(page.items.len());
    for email in page.items {
        let lead_id = match email.lead_id {
            Some(id) => state.lead_public_id(id).await?,
            None => None,
        };
        items.push(EmailResponse::new(email, lead_id));
    }

    Ok(Json(EmailListResponse {
        items,
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

//! Contact form and lead management endpoints

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use realty_catalog::Visibility;
use realty_crm::ContactForm;
use realty_database::{Lead, LeadFilter, LeadSource, LeadStatus, UpdateLeadRequest};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::rest::ActionResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct LeadResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: Option<String>,
    /// contact_form, chat, property_inquiry or manual
    pub source: String,
    /// Pipeline column.
    pub status: String,
    /// Public id of the property the lead asked about.
    pub property_id: Option<String>,
    /// Public id of the assigned agent.
    pub assigned_to: Option<String>,
    pub email_verified: bool,
    pub verified_at: Option<String>,
    pub board_position: i64,
    pub notes: Option<String>,
    pub closed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Converts leads to responses, resolving referenced rows to public ids once per batch.
pub(crate) struct LeadPresenter {
    users: HashMap<i64, String>,
    properties: HashMap<i64, Option<String>>,
}

impl LeadPresenter {
    pub(crate) async fn load(state: &GatewayState) -> GatewayResult<Self> {
        Ok(Self {
            users: state.user_directory().await?,
            properties: HashMap::new(),
        })
    }

    pub(crate) async fn present(&mut self, state: &GatewayState, lead: Lead) -> GatewayResult<LeadResponse> {
        let property_id = match lead.property_id {
            Some(id) => match self.properties.get(&id) {
                Some(cached) => cached.clone(),
                None => {
                    let public_id = state.property_public_id(Some(id)).await?;
                    self.properties.insert(id, public_id.clone());
                    public_id
                }
            },
            None => None,
        };
        let assigned_to = lead.assigned_to.and_then(|id| self.users.get(&id).cloned());

        Ok(LeadResponse {
            id: lead.public_id,
            name: lead.name,
            email: lead.email,
            phone: lead.phone,
            message: lead.message,
            source: lead.source.to_string(),
            status: lead.status.to_string(),
            property_id,
            assigned_to,
            email_verified: lead.email_verified,
            verified_at: lead.verified_at,
            board_position: lead.board_position,
            notes: lead.notes,
            closed_at: lead.closed_at,
            created_at: lead.created_at,
            updated_at: lead.updated_at,
        })
    }

    pub(crate) async fn present_all(
        &mut self,
        state: &GatewayState,
        leads: Vec<Lead>,
    ) -> GatewayResult<Vec<LeadResponse>> {
        let mut out = Vec::with_capacity(leads.len());
        for lead in leads {
            out.push(self.present(state, lead).await?);
        }
        Ok(out)
    }
}

async fn present_one(state: &GatewayState, lead: Lead) -> GatewayResult<Json<LeadResponse>> {
    let mut presenter = LeadPresenter::load(state).await?;
    Ok(Json(presenter.present(state, lead).await?))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LeadListResponse {
    pub items: Vec<LeadResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContactFormRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    /// Public id of the listing the visitor is asking about.
    pub property_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactFormResponse {
    pub success: bool,
    pub lead_id: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeadQuery {
    #[param(value_type = Option<String>)]
    pub status: Option<LeadStatus>,
    #[param(value_type = Option<String>)]
    pub source: Option<LeadSource>,
    /// Public id of an agent.
    pub assigned_to: Option<String>,
    /// Matches name, email or phone.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLeadBody {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
    pub notes: Option<String>,
    pub property_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LeadStatusRequest {
    #[schema(value_type = String)]
    pub status: LeadStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignLeadRequest {
    /// Public id of the agent, or null to unassign.
    pub assignee_id: Option<String>,
}

pub fn create_public_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/api/leads", post(submit_contact_form))
}

pub fn create_dashboard_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/dashboard/leads", get(list_leads))
        .route(
            "/api/dashboard/leads/:id",
            get(get_lead).put(update_lead).delete(delete_lead),
        )
        .route("/api/dashboard/leads/:id/status", put(update_lead_status))
        .route("/api/dashboard/leads/:id/assign", put(assign_lead))
}

#[utoipa::path(
    post,
    path = "/api/leads",
    tag = "Leads",
    request_body = ContactFormRequest,
    responses(
        (status = 200, description = "Lead captured", body = ContactFormResponse),
        (status = 400, description = "Invalid submission", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown property", body = crate::error::ErrorResponse)
    )
)]
pub async fn submit_contact_form(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<ContactFormRequest>,
) -> GatewayResult<Json<ContactFormResponse>> {
    let (property_id, source) = match req.property_id.as_deref() {
        Some(public_id) => (
            // Visitors can only ask about listings the public site shows.
            Some(state.property_row_id(public_id, Visibility::Public).await?),
            Some(LeadSource::PropertyInquiry),
        ),
        None => (None, None),
    };

    let lead = state
        .crm
        .leads
        .capture_contact(ContactForm {
            name: req.name,
            email: req.email,
            phone: req.phone,
            message: req.message,
            property_id,
            source,
        })
        .await?;

    Ok(Json(ContactFormResponse {
        success: true,
        lead_id: lead.public_id,
    }))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/leads",
    tag = "Dashboard Leads",
    security(("bearerAuth" = [])),
    params(LeadQuery),
    responses(
        (status = 200, description = "Leads, newest first", body = LeadListResponse),
        (status = 403, description = "Not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_leads(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<LeadQuery>,
) -> GatewayResult<Json<LeadListResponse>> {
    current.require_lead_access()?;

    let assigned_to = match query.assigned_to.as_deref() {
        Some(public_id) => Some(state.user_row_id(public_id).await?),
        None => None,
    };
    let page = state
        .crm
        .leads
        .list(LeadFilter {
            status: query.status,
            source: query.source,
            assigned_to,
            search: query.search,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;

    let mut presenter = LeadPresenter::load(&state).await?;
    Ok(Json(LeadListResponse {
        items: presenter.present_all(&state, page.items).await?,
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/leads/{id}",
    tag = "Dashboard Leads",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Lead public ID")),
    responses(
        (status = 200, description = "The lead", body = LeadResponse),
        (status = 404, description = "Lead not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_lead(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<LeadResponse>> {
    current.require_lead_access()?;
    let lead = state.crm.leads.get(&id).await?;
    present_one(&state, lead).await
}

#[utoipa::path(
    put,
    path = "/api/dashboard/leads/{id}",
    tag = "Dashboard Leads",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Lead public ID")),
    request_body = UpdateLeadBody,
    responses(
        (status = 200, description = "Lead updated", body = LeadResponse),
        (status = 400, description = "Invalid update", body = crate::error::ErrorResponse),
        (status = 404, description = "Lead not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_lead(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateLeadBody>,
) -> GatewayResult<Json<LeadResponse>> {
    current.require_lead_access()?;

    let property_id = match req.property_id.as_deref() {
        Some(public_id) => Some(state.property_row_id(public_id, Visibility::All).await?),
        None => None,
    };
    let lead = state
        .crm
        .leads
        .update(
            &id,
            UpdateLeadRequest {
                name: req.name,
                phone: req.phone,
                message: req.message,
                notes: req.notes,
                property_id,
            },
        )
        .await?;
    present_one(&state, lead).await
}

#[utoipa::path(
    delete,
    path = "/api/dashboard/leads/{id}",
    tag = "Dashboard Leads",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Lead public ID")),
    responses(
        (status = 200, description = "Lead deleted", body = ActionResponse),
        (status = 404, description = "Lead not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_lead(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<ActionResponse>> {
    current.require_lead_access()?;
    state.crm.leads.delete(&id).await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/leads/{id}/status",
    tag = "Dashboard Leads",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Lead public ID")),
    request_body = LeadStatusRequest,
    responses(
        (status = 200, description = "Lead moved to the end of the new column", body = LeadResponse),
        (status = 404, description = "Lead not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_lead_status(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<LeadStatusRequest>,
) -> GatewayResult<Json<LeadResponse>> {
    current.require_lead_access()?;
    let lead = state.crm.leads.update_status(&id, req.status).await?;
    present_one(&state, lead).await
}

#[utoipa::path(
    put,
    path = "/api/dashboard/leads/{id}/assign",
    tag = "Dashboard Leads",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Lead public ID")),
    request_body = AssignLeadRequest,
    responses(
        (status = 200, description = "Assignee changed", body = LeadResponse),
        (status = 404, description = "Lead or agent not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn assign_lead(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<AssignLeadRequest>,
) -> GatewayResult<Json<LeadResponse>> {
    current.require_lead_access()?;

    let assignee = match req.assignee_id.as_deref() {
        Some(public_id) => Some(state.user_row_id(public_id).await?),
        None => None,
    };
    let lead = state.crm.leads.assign(&id, assignee).await?;
    present_one(&state, lead).await
}

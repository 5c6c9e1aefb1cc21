//! Agency-wide CRM settings

use std::sync::Arc;

use axum::{extract::State, routing::get, Extension, Json, Router};
use realty_database::{CrmConfig, UpdateCrmConfigRequest};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct CrmConfigResponse {
    pub agency_name: String,
    /// Where new-lead notifications go.
    pub contact_email: Option<String>,
    pub notify_on_new_lead: bool,
    /// Public id of the agent new leads are assigned to.
    pub default_assignee_id: Option<String>,
    pub assistant_enabled: bool,
    pub assistant_greeting: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateCrmConfigBody {
    pub agency_name: Option<String>,
    pub contact_email: Option<String>,
    pub notify_on_new_lead: Option<bool>,
    pub default_assignee_id: Option<String>,
    pub assistant_enabled: Option<bool>,
    /// An empty greeting falls back to the configured default.
    pub assistant_greeting: Option<String>,
    #[serde(default)]
    pub clear_default_assignee: bool,
    #[serde(default)]
    pub clear_contact_email: bool,
}

async fn present(state: &GatewayState, config: CrmConfig) -> GatewayResult<CrmConfigResponse> {
    let default_assignee_id = match config.default_assignee_id {
        Some(id) => state.authenticator.user_by_id(id).await?.map(|u| u.public_id),
        None => None,
    };

    Ok(CrmConfigResponse {
        agency_name: config.agency_name,
        contact_email: config.contact_email,
        notify_on_new_lead: config.notify_on_new_lead,
        default_assignee_id,
        assistant_enabled: config.assistant_enabled,
        assistant_greeting: config.assistant_greeting,
        updated_at: config.updated_at,
    })
}

pub fn create_settings_routes() -> Router<Arc<GatewayState>> {
    Router::new().route(
        "/api/dashboard/crm-config",
        get(get_crm_config).put(update_crm_config),
    )
}

#[utoipa::path(
    get,
    path = "/api/dashboard/crm-config",
    tag = "CRM Config",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current settings, defaults when never saved", body = CrmConfigResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_crm_config(
    State(state): State<Arc<GatewayState>>,
    Extension(_current): Extension<CurrentUser>,
) -> GatewayResult<Json<CrmConfigResponse>> {
    let config = state.crm.settings.get().await?;
    Ok(Json(present(&state, config).await?))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/crm-config",
    tag = "CRM Config",
    security(("bearerAuth" = [])),
    request_body = UpdateCrmConfigBody,
    responses(
        (status = 200, description = "Settings saved", body = CrmConfigResponse),
        (status = 400, description = "Invalid settings", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrators only", body = crate::error::ErrorResponse),
        (status = 404, description = "Default assignee not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_crm_config(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<UpdateCrmConfigBody>,
) -> GatewayResult<Json<CrmConfigResponse>> {
    let admin = current.require_admin()?;

    let default_assignee_id = match req.default_assignee_id.as_deref() {
        Some(public_id) => Some(state.user_row_id(public_id).await?),
        None => None,
    };
    let config = state
        .crm
        .settings
        .update(UpdateCrmConfigRequest {
            agency_name: req.agency_name,
            contact_email: req.contact_email,
            notify_on_new_lead: req.notify_on_new_lead,
            default_assignee_id,
            assistant_enabled: req.assistant_enabled,
            assistant_greeting: req.assistant_greeting,
            clear_default_assignee: req.clear_default_assignee,
            clear_contact_email: req.clear_contact_email,
        })
        .await?;

    info!(admin = %admin.public_id, "crm settings updated");
    Ok(Json(present(&state, config).await?))
}

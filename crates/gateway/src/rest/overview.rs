use std::sync::Arc;

use axum::{extract::State, routing::get, Extension, Json, Router};
use realty_crm::StatusCount;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCountResponse {
    pub status: String,
    pub count: i64,
}

impl From<StatusCount> for StatusCountResponse {
    fn from(count: StatusCount) -> Self {
        Self {
            status: count.status,
            count: count.count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OverviewResponse {
    pub properties_by_status: Vec<StatusCountResponse>,
    pub leads_by_status: Vec<StatusCountResponse>,
    pub open_conversations: i64,
    pub published_posts: i64,
    pub queued_emails: i64,
    pub failed_emails: i64,
}

pub fn create_overview_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/api/dashboard/overview", get(get_overview))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/overview",
    tag = "Dashboard",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Headline numbers for the dashboard home", body = OverviewResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_overview(
    State(state): State<Arc<GatewayState>>,
    Extension(_current): Extension<CurrentUser>,
) -> GatewayResult<Json<OverviewResponse>> {
    let overview = state.crm.dashboard.overview().await?;

    Ok(Json(OverviewResponse {
        properties_by_status: overview.properties_by_status.into_iter().map(Into::into).collect(),
        leads_by_status: overview.leads_by_status.into_iter().map(Into::into).collect(),
        open_conversations: overview.open_conversations,
        published_posts: overview.published_posts,
        queued_emails: overview.queued_emails,
        failed_emails: overview.failed_emails,
    }))
}

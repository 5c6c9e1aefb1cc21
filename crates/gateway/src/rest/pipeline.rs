//! Kanban board endpoints

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use realty_database::LeadStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::rest::leads::{LeadPresenter, LeadResponse};
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct BoardColumnResponse {
    pub status: String,
    pub leads: Vec<LeadResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BoardResponse {
    /// One column per status, in pipeline order.
    pub columns: Vec<BoardColumnResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveLeadRequest {
    pub lead_id: String,
    #[schema(value_type = String)]
    pub status: LeadStatus,
    /// Zero-based position in the target column. Past the end appends.
    pub index: i64,
}

pub fn create_pipeline_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/dashboard/pipeline", get(get_board))
        .route("/api/dashboard/pipeline/move", post(move_lead))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/pipeline",
    tag = "Pipeline",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The lead board", body = BoardResponse),
        (status = 403, description = "Not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_board(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
) -> GatewayResult<Json<BoardResponse>> {
    current.require_lead_access()?;

    let board = state.crm.pipeline.board().await?;
    let mut presenter = LeadPresenter::load(&state).await?;
    let mut columns = Vec::with_capacity(board.len());
    for column in board {
        columns.push(BoardColumnResponse {
            status: column.status.to_string(),
            leads: presenter.present_all(&state, column.leads).await?,
        });
    }
    Ok(Json(BoardResponse { columns }))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/pipeline/move",
    tag = "Pipeline",
    security(("bearerAuth" = [])),
    request_body = MoveLeadRequest,
    responses(
        (status = 200, description = "Lead moved", body = LeadResponse),
        (status = 400, description = "Invalid position", body = crate::error::ErrorResponse),
        (status = 404, description = "Lead not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn move_lead(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<MoveLeadRequest>,
) -> GatewayResult<Json<LeadResponse>> {
    current.require_lead_access()?;

    let lead = state
        .crm
        .pipeline
        .move_lead(&req.lead_id, req.status, req.index)
        .await?;
    let mut presenter = LeadPresenter::load(&state).await?;
    Ok(Json(presenter.present(&state, lead).await?))
}

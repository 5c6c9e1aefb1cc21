//! Back-office account management, administrators only

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use realty_auth::NewUser;
use realty_database::{UserRole, UserStatus};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::rest::auth::UserResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct UsersResponse {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserBody {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// admin, agent or editor
    #[schema(value_type = String)]
    pub role: UserRole,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserStatusRequest {
    /// active or disabled
    #[schema(value_type = String)]
    pub status: UserStatus,
}

pub fn create_user_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/dashboard/users", get(list_users).post(create_user))
        .route("/api/dashboard/users/:id/status", put(set_user_status))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "All back-office accounts", body = UsersResponse),
        (status = 403, description = "Administrators only", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
) -> GatewayResult<Json<UsersResponse>> {
    current.require_admin()?;

    let users = state.authenticator.list_users().await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    request_body = CreateUserBody,
    responses(
        (status = 200, description = "Account created", body = UserResponse),
        (status = 400, description = "Invalid email, password or name", body = crate::error::ErrorResponse),
        (status = 403, description = "Administrators only", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_user(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateUserBody>,
) -> GatewayResult<Json<UserResponse>> {
    let admin = current.require_admin()?;

    let user = state
        .authenticator
        .create_user(NewUser {
            email: req.email,
            password: req.password,
            display_name: req.display_name,
            role: req.role,
        })
        .await?;

    info!(admin = %admin.public_id, user = %user.public_id, role = %user.role, "account created from dashboard");
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/users/{id}/status",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "User public ID")),
    request_body = UserStatusRequest,
    responses(
        (status = 200, description = "Status changed; disabling ends the user's sessions", body = UserResponse),
        (status = 403, description = "Administrators only", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Would disable the last administrator", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_user_status(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UserStatusRequest>,
) -> GatewayResult<Json<UserResponse>> {
    current.require_admin()?;

    let user = state.authenticator.set_user_status(&id, req.status).await?;
    Ok(Json(user.into()))
}

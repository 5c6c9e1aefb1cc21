//! REST API endpoints for the gateway

pub mod auth;
pub mod chat;
pub mod conversations;
pub mod emails;
pub mod health;
pub mod leads;
pub mod overview;
pub mod pipeline;
pub mod posts;
pub mod properties;
pub mod settings;
pub mod users;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::middleware::{lead_token_middleware, session_middleware};
use crate::state::GatewayState;

/// Acknowledges an action that has nothing else to return.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub success: bool,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Create all REST API routes
pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let dashboard = Router::new()
        .merge(properties::create_dashboard_routes())
        .merge(leads::create_dashboard_routes())
        .merge(pipeline::create_pipeline_routes())
        .merge(conversations::create_conversation_routes())
        .merge(posts::create_dashboard_routes())
        .merge(users::create_user_routes())
        .merge(emails::create_email_routes())
        .merge(settings::create_settings_routes())
        .merge(overview::create_overview_routes())
        .route_layer(from_fn_with_state(state.clone(), session_middleware));

    let lead_chat = chat::create_lead_routes()
        .route_layer(from_fn_with_state(state, lead_token_middleware));

    Router::new()
        .merge(health::create_health_routes())
        .merge(auth::create_auth_routes())
        .merge(properties::create_public_routes())
        .merge(posts::create_public_routes())
        .merge(leads::create_public_routes())
        .merge(chat::create_otp_routes())
        .merge(lead_chat)
        .merge(dashboard)
}

//! Middleware for authentication and other cross-cutting concerns

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use realty_database::{Conversation, Lead, User};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;
use crate::util::require_bearer;

/// The back-office user behind a dashboard request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn require_admin(&self) -> GatewayResult<&User> {
        self.require(self.0.role.is_admin(), "administrators")
    }

    pub fn require_lead_access(&self) -> GatewayResult<&User> {
        self.require(self.0.role.can_manage_leads(), "agents and administrators")
    }

    pub fn require_listing_access(&self) -> GatewayResult<&User> {
        self.require(self.0.role.can_manage_listings(), "agents and administrators")
    }

    pub fn require_post_access(&self) -> GatewayResult<&User> {
        self.require(self.0.role.can_manage_posts(), "content editors")
    }

    fn require(&self, allowed: bool, who: &str) -> GatewayResult<&User> {
        if allowed {
            Ok(&self.0)
        } else {
            Err(GatewayError::forbidden(format!("only {who} may do this")))
        }
    }
}

/// The verified lead behind a chat widget request.
#[derive(Debug, Clone)]
pub struct LeadSession {
    pub lead: Lead,
    pub conversation: Conversation,
}

/// Resolve the bearer session token for `/api/dashboard/*`.
pub async fn session_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = require_bearer(request.headers())?;
    let (user, _session) = state.authenticate(&token).await?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Resolve the bearer lead token for the chat widget endpoints.
pub async fn lead_token_middleware(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let token = require_bearer(request.headers())?;
    let (lead, conversation) = state.crm.verification.authenticate(&token).await?;

    request.extensions_mut().insert(LeadSession { lead, conversation });
    Ok(next.run(request).await)
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

/// CORS for the marketing site and dashboard. No origins configured means any origin.
pub fn create_cors_middleware(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
}

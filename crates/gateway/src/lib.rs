//! # Realty Gateway Crate
//!
//! The JSON HTTP API for the marketing site, the chat widget and the agency
//! dashboard, routed onto the catalog, auth and CRM services.
//!
//! ## Architecture
//!
//! - **REST**: public, chat widget and dashboard endpoints with OpenAPI documentation
//! - **State**: shared services behind an `Arc`
//! - **Middleware**: sessions for `/api/dashboard/*`, lead tokens for the chat, CORS and request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use realty_gateway::{create_router, GatewayState};
//!
//! let state = GatewayState::new(authenticator, properties, posts, crm, config.http.clone());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod docs;
pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod util;

pub use docs::ApiDoc;
pub use error::{ErrorResponse, GatewayError, GatewayResult};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let cors = middleware::create_cors_middleware(&state.http.cors_origins);
    let arc_state = Arc::new(state);

    #[allow(unused_mut)]
    let mut router = Router::new().merge(rest::create_rest_routes(arc_state.clone()).with_state(arc_state));

    #[cfg(debug_assertions)]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        router = router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
}

//! Error types for the gateway layer

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use realty_auth::AuthError;
use realty_catalog::CatalogError;
use realty_crm::CrmError;
use realty_database::DatabaseError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// Body of every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    /// HTTP status code as text, e.g. "404".
    pub error: String,
    pub message: String,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    AuthorizationFailed(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Gone(String),

    #[error("please wait {retry_after_seconds}s before trying again")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("internal server error")]
    InternalError(String),
}

impl GatewayError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::AuthorizationFailed(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AuthorizationFailed(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Gone(_) => StatusCode::GONE,
            GatewayError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log the detail of a server-side failure and hide it from the client.
    fn internal(context: &str, detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "{context}");
        GatewayError::InternalError(detail.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = match &self {
            GatewayError::RateLimitExceeded { retry_after_seconds } => Some(*retry_after_seconds),
            _ => None,
        };

        let body = Json(ErrorResponse {
            success: false,
            error: status.as_str().to_string(),
            message: self.to_string(),
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<DatabaseError> for GatewayError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(entity) => GatewayError::NotFound(format!("{entity} not found")),
            DatabaseError::Duplicate(entity) => GatewayError::Conflict(format!("{entity} already exists")),
            other => GatewayError::internal("database error", other),
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidLeadToken
            | AuthError::LeadTokenExpired => GatewayError::AuthenticationFailed(error.to_string()),
            AuthError::AccountDisabled => GatewayError::AuthorizationFailed(error.to_string()),
            AuthError::UserNotFound => GatewayError::NotFound(error.to_string()),
            AuthError::UserExists | AuthError::LastAdmin => GatewayError::Conflict(error.to_string()),
            AuthError::InvalidEmail | AuthError::WeakPassword | AuthError::MissingDisplayName => {
                GatewayError::InvalidRequest(error.to_string())
            }
            AuthError::Database(inner) => inner.into(),
            AuthError::TokenCreation(_) | AuthError::PasswordHash(_) | AuthError::InvalidConfig(_) => {
                GatewayError::internal("auth error", error)
            }
        }
    }
}

impl From<CatalogError> for GatewayError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::Validation(message) => GatewayError::InvalidRequest(message),
            CatalogError::NotFound(_) => GatewayError::NotFound(error.to_string()),
            CatalogError::Database(inner) => inner.into(),
        }
    }
}

impl From<CrmError> for GatewayError {
    fn from(error: CrmError) -> Self {
        match error {
            CrmError::Validation(message) => GatewayError::InvalidRequest(message),
            CrmError::NotFound(_) => GatewayError::NotFound(error.to_string()),
            CrmError::TooManyRequests { retry_after_seconds } => {
                GatewayError::RateLimitExceeded { retry_after_seconds }
            }
            CrmError::OtpNotFound | CrmError::OtpInvalid => GatewayError::InvalidRequest(error.to_string()),
            CrmError::OtpExpired | CrmError::OtpAttemptsExceeded => GatewayError::Gone(error.to_string()),
            CrmError::ConversationClosed => GatewayError::Conflict(error.to_string()),
            CrmError::Mail(_) => {
                error!(error = %error, "mail delivery failed");
                GatewayError::ServiceUnavailable("the email could not be sent, try again later".to_string())
            }
            CrmError::Auth(inner) => inner.into(),
            CrmError::Catalog(inner) => inner.into(),
            CrmError::Database(inner) => inner.into(),
            CrmError::Assistant(_) => GatewayError::internal("assistant error", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crm_errors_map_to_expected_statuses() {
        let cases = [
            (CrmError::validation("bad"), StatusCode::BAD_REQUEST),
            (CrmError::not_found("lead"), StatusCode::NOT_FOUND),
            (CrmError::TooManyRequests { retry_after_seconds: 5 }, StatusCode::TOO_MANY_REQUESTS),
            (CrmError::OtpExpired, StatusCode::GONE),
            (CrmError::OtpInvalid, StatusCode::BAD_REQUEST),
            (CrmError::ConversationClosed, StatusCode::CONFLICT),
            (CrmError::Auth(AuthError::InvalidLeadToken), StatusCode::UNAUTHORIZED),
        ];

        for (error, expected) in cases {
            assert_eq!(GatewayError::from(error).status_code(), expected);
        }
    }

    #[test]
    fn database_not_found_becomes_404_with_entity_name() {
        let error = GatewayError::from(DatabaseError::NotFound("property".to_string()));
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.to_string(), "property not found");
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let error = GatewayError::from(DatabaseError::ConnectionError("disk on fire".to_string()));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "internal server error");
    }

    #[test]
    fn rate_limit_sets_retry_after_header() {
        let response = GatewayError::RateLimitExceeded { retry_after_seconds: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}

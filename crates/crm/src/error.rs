//! Error types for the CRM services.

use realty_assistant::AssistantError;
use realty_auth::AuthError;
use realty_catalog::CatalogError;
use realty_database::DatabaseError;
use thiserror::Error;

pub type CrmResult<T> = Result<T, CrmError>;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("please wait {retry_after_seconds}s before requesting another code")]
    TooManyRequests { retry_after_seconds: u64 },

    #[error("no verification code was requested for this email")]
    OtpNotFound,

    #[error("verification code has expired")]
    OtpExpired,

    #[error("verification code is incorrect")]
    OtpInvalid,

    #[error("too many incorrect attempts, request a new code")]
    OtpAttemptsExceeded,

    #[error("conversation is closed")]
    ConversationClosed,

    #[error("mail delivery failed: {0}")]
    Mail(String),

    #[error("assistant failed: {0}")]
    Assistant(#[from] AssistantError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("database error: {0}")]
    Database(DatabaseError),
}

impl CrmError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }
}

impl From<DatabaseError> for CrmError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(entity) => CrmError::NotFound(entity),
            other => CrmError::Database(other),
        }
    }
}

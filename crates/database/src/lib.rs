//! Realty Database Crate
//!
//! Connection management, embedded migrations, entities, and repositories
//! for the agency back-office.

use sqlx::SqlitePool;
use realty_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod time;
pub mod types;

pub use connection::{prepare_database, DatabaseConnection};
pub use migrations::run_migrations;
pub use time::{format_timestamp, now_timestamp, parse_timestamp};

pub use repos::{
    ConversationRepository, CrmConfigRepository, EmailRepository, LeadRepository,
    MessageRepository, OtpRepository, PostRepository, PropertyRepository, SessionRepository,
    UserRepository,
};

pub use entities::{
    AuthSession, Conversation, ConversationFilter, ConversationStatus, CreateEmailRequest,
    CreateLeadRequest, CreatePostRequest, CreatePropertyRequest, CreateUserRequest, CrmConfig,
    Email, EmailFilter, EmailKind, EmailStatus, Lead, LeadFilter, LeadSource, LeadStatus,
    ListingType, Message, MessageSender, NewMessage, OtpRecord, Post, PostFilter, PostStatus,
    Property, PropertyFilter, PropertyStatus, PropertyType, UpdateCrmConfigRequest,
    UpdateLeadRequest, UpdatePostRequest, UpdatePropertyRequest, User, UserRole, UserStatus,
};

pub use types::{page_bounds, DatabaseError, DatabaseResult, Page};

pub use sqlx::SqlitePool as Pool;

/// Connect and apply migrations.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

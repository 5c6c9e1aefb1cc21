use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use rand::RngCore;
use realty_config::{AuthConfig, BootstrapAdminConfig};
use realty_database::{
    format_timestamp, now_timestamp, parse_timestamp, AuthSession, CreateUserRequest,
    DatabaseError, SessionRepository, User, UserRepository, UserRole, UserStatus,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod lead_token;
pub mod password;

pub use lead_token::{LeadClaims, LeadToken, LeadTokenIssuer};

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must be at least {} characters", password::MIN_PASSWORD_LENGTH)]
    WeakPassword,
    #[error("display name is required")]
    MissingDisplayName,
    #[error("the last active administrator cannot be disabled")]
    LastAdmin,
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid lead token")]
    InvalidLeadToken,
    #[error("lead token expired")]
    LeadTokenExpired,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("token creation failed: {0}")]
    TokenCreation(String),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
}

/// Convert a configured lifetime, rejecting values chrono cannot represent.
pub fn ttl_from_seconds(setting: &str, seconds: u64) -> AuthResult<Duration> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| AuthError::InvalidConfig(format!("{setting} is out of range: {seconds}")))
}

/// Input for `Authenticator::create_user`.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: UserRole,
}

/// Back-office accounts and their login sessions.
#[derive(Clone)]
pub struct Authenticator {
    users: UserRepository,
    sessions: SessionRepository,
    session_ttl: Duration,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self {
            users: UserRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool),
            session_ttl: ttl_from_seconds("auth.session_ttl_seconds", config.session_ttl_seconds)?,
        })
    }

    pub async fn create_user(&self, new_user: NewUser) -> AuthResult<User> {
        let email = new_user.email.trim().to_lowercase();
        if !password::is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if !password::is_acceptable_password(&new_user.password) {
            return Err(AuthError::WeakPassword);
        }
        let display_name = new_user.display_name.trim();
        if display_name.is_empty() {
            return Err(AuthError::MissingDisplayName);
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = password::hash_password(&new_user.password)?;
        let user = self
            .users
            .create(&CreateUserRequest {
                email,
                display_name: display_name.to_string(),
                role: new_user.role,
                password_hash,
            })
            .await
            .map_err(|err| match err {
                DatabaseError::Duplicate(_) => AuthError::UserExists,
                other => AuthError::Database(other),
            })?;

        info!(user = %user.public_id, role = %user.role, "created back-office user");
        Ok(user)
    }

    /// Create the configured administrator unless one already exists.
    pub async fn ensure_admin(&self, admin: &BootstrapAdminConfig) -> AuthResult<Option<User>> {
        if self.users.count_admins().await? > 0 {
            debug!("administrator already present; skipping bootstrap");
            return Ok(None);
        }

        let user = self
            .create_user(NewUser {
                email: admin.email.clone(),
                password: admin.password.clone(),
                display_name: admin
                    .display_name
                    .clone()
                    .unwrap_or_else(|| "Administrator".to_string()),
                role: UserRole::Admin,
            })
            .await?;
        Ok(Some(user))
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<(User, AuthSession)> {
        let Some(user) = self.users.find_by_email(email).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        if !password::verify_password(password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active() {
            return Err(AuthError::AccountDisabled);
        }

        if let Err(err) = self.users.touch_last_login(user.id).await {
            warn!(user = %user.public_id, error = %err, "failed to record last login");
        }

        let session = self.issue_session(user.id).await?;
        info!(user = %user.public_id, "user logged in");
        Ok((user, session))
    }

    /// Resolve a session token to its user. Expired sessions are removed.
    pub async fn authenticate(&self, token: &str) -> AuthResult<(User, AuthSession)> {
        let Some(session) = self.sessions.find_by_token(token).await? else {
            return Err(AuthError::SessionNotFound);
        };

        let expires_at = parse_timestamp(&session.expires_at)?;
        if expires_at <= Utc::now() {
            self.sessions.delete_by_token(token).await?;
            return Err(AuthError::SessionExpired);
        }

        let user = self
            .users
            .find_by_id(session.user_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        if !user.is_active() {
            return Err(AuthError::AccountDisabled);
        }

        Ok((user, session))
    }

    pub async fn logout(&self, token: &str) -> AuthResult<()> {
        if !self.sessions.delete_by_token(token).await? {
            return Err(AuthError::SessionNotFound);
        }
        Ok(())
    }

    pub async fn list_users(&self) -> AuthResult<Vec<User>> {
        Ok(self.users.list().await?)
    }

    pub async fn user_by_public_id(&self, public_id: &str) -> AuthResult<User> {
        self.users
            .find_by_public_id(public_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn user_by_id(&self, id: i64) -> AuthResult<Option<User>> {
        Ok(self.users.find_by_id(id).await?)
    }

    /// Disabling a user also ends their sessions.
    pub async fn set_user_status(&self, public_id: &str, status: UserStatus) -> AuthResult<User> {
        let mut user = self.user_by_public_id(public_id).await?;

        if status == UserStatus::Disabled && user.role.is_admin() && user.is_active() {
            let active_admins = self
                .users
                .list()
                .await?
                .into_iter()
                .filter(|u| u.role.is_admin() && u.is_active())
                .count();
            if active_admins <= 1 {
                return Err(AuthError::LastAdmin);
            }
        }

        self.users.set_status(user.id, status).await?;
        if status == UserStatus::Disabled {
            let ended = self.sessions.delete_for_user(user.id).await?;
            info!(user = %user.public_id, sessions = ended, "disabled user");
        }

        user.status = status;
        Ok(user)
    }

    pub async fn set_password(&self, public_id: &str, new_password: &str) -> AuthResult<()> {
        if !password::is_acceptable_password(new_password) {
            return Err(AuthError::WeakPassword);
        }
        let user = self.user_by_public_id(public_id).await?;
        let hash = password::hash_password(new_password)?;
        self.users.set_password_hash(user.id, &hash).await?;
        Ok(())
    }

    pub async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        Ok(self.sessions.delete_expired(&now_timestamp()).await?)
    }

    async fn issue_session(&self, user_id: i64) -> AuthResult<AuthSession> {
        let token = generate_session_token();
        let expires_at = format_timestamp(Utc::now() + self.session_ttl);
        Ok(self.sessions.create(&token, user_id, &expires_at).await?)
    }
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

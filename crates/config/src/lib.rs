use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "realty.toml",
    "config/realty.toml",
    "crates/config/realty.toml",
    "../realty.toml",
    "../config/realty.toml",
    "backend/realty.toml",
    "backend/config/realty.toml",
];

/// Secret shipped in the defaults so development setups work out of the box.
pub const DEVELOPMENT_TOKEN_SECRET: &str = "development-lead-token-secret-change-me";

/// Upper bound for every `*_seconds` lifetime setting (ten years).
pub const MAX_TTL_SECONDS: u64 = 10 * 365 * 86_400;

pub const MIN_OTP_CODE_LENGTH: u32 = 4;
pub const MAX_OTP_CODE_LENGTH: u32 = 9;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub otp: OtpConfig,
    pub assistant: AssistantConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://realty.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_seconds: u64,
    pub lead_token_secret: String,
    pub lead_token_issuer: String,
    pub lead_token_ttl_seconds: u64,
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: 86_400,
            lead_token_secret: DEVELOPMENT_TOKEN_SECRET.to_string(),
            lead_token_issuer: "realty".to_string(),
            lead_token_ttl_seconds: 7 * 86_400,
            bootstrap_admin: None,
        }
    }
}

impl AppConfig {
    /// Reject settings the services cannot honour.
    ///
    /// ```
    /// use realty_config::AppConfig;
    ///
    /// let mut config = AppConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.otp.code_length = 12;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> anyhow::Result<()> {
        let lifetimes = [
            ("auth.session_ttl_seconds", self.auth.session_ttl_seconds),
            ("auth.lead_token_ttl_seconds", self.auth.lead_token_ttl_seconds),
            ("otp.ttl_seconds", self.otp.ttl_seconds),
            ("otp.resend_cooldown_seconds", self.otp.resend_cooldown_seconds),
        ];
        for (key, seconds) in lifetimes {
            if seconds > MAX_TTL_SECONDS {
                anyhow::bail!(
                    "invalid configuration: {key} must be at most {MAX_TTL_SECONDS} seconds, got {seconds}"
                );
            }
        }

        if !(MIN_OTP_CODE_LENGTH..=MAX_OTP_CODE_LENGTH).contains(&self.otp.code_length) {
            anyhow::bail!(
                "invalid configuration: otp.code_length must be between {MIN_OTP_CODE_LENGTH} and {MAX_OTP_CODE_LENGTH}, got {}",
                self.otp.code_length
            );
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn uses_development_secret(&self) -> bool {
        self.lead_token_secret == DEVELOPMENT_TOKEN_SECRET
    }
}

/// Account created by `seed-data` when no administrator exists yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtpStoreKind {
    Database,
    Memory,
}

/// One-time code settings for the chat widget.
///
/// ```
/// use realty_config::{OtpConfig, OtpStoreKind};
///
/// let otp = OtpConfig::default();
/// assert_eq!(otp.code_length, 6);
/// assert_eq!(otp.ttl_seconds, 600);
/// assert_eq!(otp.store, OtpStoreKind::Database);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub code_length: u32,
    pub ttl_seconds: u64,
    pub max_attempts: u32,
    pub resend_cooldown_seconds: u64,
    pub store: OtpStoreKind,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl_seconds: 600,
            max_attempts: 5,
            resend_cooldown_seconds: 60,
            store: OtpStoreKind::Database,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub name: String,
    pub history_limit: usize,
    pub greeting: String,
    pub handoff_message: String,
    pub max_listings_in_reply: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Ava".to_string(),
            history_limit: 20,
            greeting: "Hi! I'm Ava, the virtual assistant. Ask me about any of our listings, \
                       or tell me what you are looking for."
                .to_string(),
            handoff_message: "Thanks! One of our agents will get back to you shortly.".to_string(),
            max_listings_in_reply: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from_address: String,
    pub from_name: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_address: "no-reply@realty.local".to_string(),
            from_name: "Realty".to_string(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use realty_config::load;
///
/// std::env::remove_var("REALTY_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let session_ttl = i64::try_from(defaults.auth.session_ttl_seconds).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.session_ttl_seconds", session_ttl)?;

    let environment_overrides = config::Environment::with_prefix("REALTY").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("REALTY_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via REALTY_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;
    config.validate()?;

    debug!(
        http = ?config.http,
        database = ?config.database,
        otp = ?config.otp,
        "loaded backend configuration"
    );
    Ok(config)
}

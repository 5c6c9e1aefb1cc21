use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use realty_assistant::ListingAssistant;
use realty_auth::Authenticator;
use realty_catalog::{PostService, PropertyService};
use realty_config::{AppConfig, HttpConfig, OtpStoreKind};
use realty_crm::{CrmServices, InMemoryOtpStore, LogMailer, OtpStore, SqlOtpStore};
use realty_database::initialize_database;
use realty_gateway::GatewayState;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::INFO)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// How often expired sessions and one-time codes are swept.
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub properties: PropertyService,
    pub posts: PostService,
    pub crm: CrmServices,
    pub http: HttpConfig,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        if config.auth.uses_development_secret() {
            warn!("lead tokens are signed with the development secret; set auth.lead_token_secret");
        }

        let otp_store: Arc<dyn OtpStore> = match config.otp.store {
            OtpStoreKind::Database => Arc::new(SqlOtpStore::new(db_pool.clone())),
            OtpStoreKind::Memory => Arc::new(InMemoryOtpStore::new()),
        };
        let crm = CrmServices::new(
            db_pool.clone(),
            config,
            Arc::new(LogMailer),
            otp_store,
            Arc::new(ListingAssistant::new(&config.assistant)),
        )
        .context("failed to wire crm services")?;

        info!(otp_store = ?config.otp.store, assistant = %config.assistant.name, "backend services ready");

        Ok(Self {
            authenticator: Authenticator::new(db_pool.clone(), &config.auth)
                .context("failed to build authenticator")?,
            properties: PropertyService::new(db_pool.clone()),
            posts: PostService::new(db_pool.clone()),
            crm,
            http: config.http.clone(),
            db_pool,
        })
    }

    pub fn gateway_state(&self) -> GatewayState {
        GatewayState::new(
            self.authenticator.clone(),
            self.properties.clone(),
            self.posts.clone(),
            self.crm.clone(),
            self.http.clone(),
        )
    }

    /// Drop expired sessions and one-time codes once.
    pub async fn run_maintenance(&self) -> Result<(u64, u64)> {
        let sessions = self
            .authenticator
            .purge_expired_sessions()
            .await
            .context("failed to purge expired sessions")?;
        let codes = self
            .crm
            .otp
            .purge_expired()
            .await
            .context("failed to purge expired one-time codes")?;
        Ok((sessions, codes))
    }

    /// Sweep on a fixed interval until the task is aborted.
    pub fn spawn_maintenance(&self, every: Duration) -> JoinHandle<()> {
        let services = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                match services.run_maintenance().await {
                    Ok((0, 0)) => {}
                    Ok((sessions, codes)) => {
                        info!(sessions, codes, "purged expired credentials")
                    }
                    Err(error) => warn!(error = %format!("{error:#}"), "maintenance sweep failed"),
                }
            }
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}

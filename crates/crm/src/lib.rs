//! # Realty CRM Crate
//!
//! The agency back-office: lead capture, the Kanban pipeline, email OTP
//! verification for the chat widget, conversations answered by the listing
//! assistant, and an outbox for every email the system sends.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use realty_crm::{CrmServices, InMemoryOtpStore, LogMailer};
//!
//! let crm = CrmServices::new(pool, &config, Arc::new(LogMailer), Arc::new(InMemoryOtpStore::new()), generator)?;
//! let lead = crm.leads.capture_contact(form).await?;
//! ```

use std::sync::Arc;

use realty_assistant::ReplyGenerator;
use realty_auth::LeadTokenIssuer;
use realty_config::AppConfig;
use sqlx::SqlitePool;

pub mod error;
pub mod mailer;
pub mod otp_store;
pub mod services;

pub use error::{CrmError, CrmResult};
pub use mailer::{LogMailer, Mailer, OutgoingEmail};
pub use otp_store::{InMemoryOtpStore, OtpStore, SqlOtpStore};
pub use services::{
    BoardColumn, ContactForm, ConversationService, CrmConfigService, DashboardOverview,
    DashboardService, EmailService, LeadMessageOutcome, LeadService, LeadVerificationFlow,
    OtpIssued, OtpService, PipelineService, StatusCount, VerifiedLead,
};

/// All CRM services wired against one pool.
#[derive(Clone)]
pub struct CrmServices {
    pub settings: CrmConfigService,
    pub emails: EmailService,
    pub leads: LeadService,
    pub pipeline: PipelineService,
    pub otp: OtpService,
    pub conversations: ConversationService,
    pub verification: LeadVerificationFlow,
    pub dashboard: DashboardService,
}

impl CrmServices {
    pub fn new(
        pool: SqlitePool,
        config: &AppConfig,
        mailer: Arc<dyn Mailer>,
        otp_store: Arc<dyn OtpStore>,
        generator: Arc<dyn ReplyGenerator>,
    ) -> CrmResult<Self> {
        let settings = CrmConfigService::new(pool.clone());
        let emails = EmailService::new(pool.clone(), mailer, &config.mail);
        let leads = LeadService::new(pool.clone(), emails.clone(), settings.clone());
        let otp = OtpService::new(otp_store, emails.clone(), settings.clone(), config.otp.clone())?;
        let conversations = ConversationService::new(
            pool.clone(),
            settings.clone(),
            generator,
            config.assistant.clone(),
        );
        let verification = LeadVerificationFlow::new(
            otp.clone(),
            leads.clone(),
            conversations.clone(),
            LeadTokenIssuer::from_config(&config.auth)?,
        );

        Ok(Self {
            pipeline: PipelineService::new(pool.clone()),
            dashboard: DashboardService::new(pool, emails.clone()),
            settings,
            emails,
            leads,
            otp,
            conversations,
            verification,
        })
    }
}

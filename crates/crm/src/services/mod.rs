//! Business logic for leads, chat and outgoing email.

pub mod config_service;
pub mod conversation_service;
pub mod dashboard_service;
pub mod email_service;
pub mod lead_service;
pub mod otp_service;
pub mod pipeline_service;
pub mod verification;

pub use config_service::CrmConfigService;
pub use conversation_service::{ConversationService, LeadMessageOutcome};
pub use dashboard_service::{DashboardOverview, DashboardService, StatusCount};
pub use email_service::EmailService;
pub use lead_service::{ContactForm, LeadService};
pub use otp_service::{OtpIssued, OtpService};
pub use pipeline_service::{BoardColumn, PipelineService};
pub use verification::{LeadVerificationFlow, VerifiedLead};

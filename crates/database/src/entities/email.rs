//! Outgoing email entity definitions

use serde::{Deserialize, Serialize};

text_enum! {
    EmailKind {
        Otp => "otp",
        LeadNotification => "lead_notification",
        LeadConfirmation => "lead_confirmation",
        Generic => "generic",
    }
}

text_enum! {
    EmailStatus {
        Queued => "queued",
        Sent => "sent",
        Failed => "failed",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: i64,
    pub public_id: String,
    pub to_address: String,
    pub subject: String,
    pub body: String,
    pub kind: EmailKind,
    pub status: EmailStatus,
    pub lead_id: Option<i64>,
    pub error: Option<String>,
    pub sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmailRequest {
    pub to_address: String,
    pub subject: String,
    pub body: String,
    pub kind: EmailKind,
    pub lead_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailFilter {
    pub kind: Option<EmailKind>,
    pub status: Option<EmailStatus>,
    pub lead_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

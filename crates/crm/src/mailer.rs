use async_trait::async_trait;
use realty_config::MailConfig;
use tracing::info;

use crate::error::CrmResult;

/// A message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers outbox emails. Failures are recorded on the outbox row.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, email: &OutgoingEmail) -> CrmResult<()>;
}

/// Writes every email to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, email: &OutgoingEmail) -> CrmResult<()> {
        info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "email delivered to log"
        );
        Ok(())
    }
}

pub(crate) fn sender(config: &MailConfig) -> String {
    if config.from_name.trim().is_empty() {
        config.from_address.clone()
    } else {
        format!("{} <{}>", config.from_name.trim(), config.from_address)
    }
}

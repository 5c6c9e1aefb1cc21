//! Outbox-backed email sending.

use std::sync::Arc;

use realty_config::MailConfig;
use realty_database::{
    CreateEmailRequest, Email, EmailFilter, EmailKind, EmailRepository, EmailStatus, Lead, Page,
};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{CrmError, CrmResult};
use crate::mailer::{sender, Mailer, OutgoingEmail};

/// Every email is written to the outbox as `queued` first, then handed to
/// the mailer and marked `sent` or `failed`.
#[derive(Clone)]
pub struct EmailService {
    emails: EmailRepository,
    mailer: Arc<dyn Mailer>,
    from: String,
}

impl EmailService {
    pub fn new(pool: SqlitePool, mailer: Arc<dyn Mailer>, config: &MailConfig) -> Self {
        Self {
            emails: EmailRepository::new(pool),
            mailer,
            from: sender(config),
        }
    }

    /// Queue and deliver. A delivery failure is recorded on the row, not returned.
    pub async fn send(&self, request: CreateEmailRequest) -> CrmResult<Email> {
        let queued = self.emails.create(&request).await?;
        let outgoing = OutgoingEmail {
            from: self.from.clone(),
            to: queued.to_address.clone(),
            subject: queued.subject.clone(),
            body: queued.body.clone(),
        };

        match self.mailer.deliver(&outgoing).await {
            Ok(()) => {
                self.emails.mark_sent(queued.id).await?;
                info!(email = %queued.public_id, kind = %queued.kind, "email sent");
            }
            Err(err) => {
                let reason = err.to_string();
                self.emails.mark_failed(queued.id, &reason).await?;
                warn!(email = %queued.public_id, kind = %queued.kind, error = %reason, "email delivery failed");
            }
        }

        self.emails
            .find_by_id(queued.id)
            .await?
            .ok_or_else(|| CrmError::not_found("email"))
    }

    pub async fn send_otp(&self, to: &str, code: &str, ttl_minutes: u64, agency: &str) -> CrmResult<Email> {
        self.send(CreateEmailRequest {
            to_address: to.to_string(),
            subject: format!("Your {agency} verification code"),
            body: format!(
                "Your verification code is {code}.\n\nIt expires in {ttl_minutes} minutes. \
                 If you did not request it you can ignore this email."
            ),
            kind: EmailKind::Otp,
            lead_id: None,
        })
        .await
    }

    pub async fn send_lead_confirmation(&self, lead: &Lead, agency: &str) -> CrmResult<Email> {
        self.send(CreateEmailRequest {
            to_address: lead.email.clone(),
            subject: format!("Thanks for contacting {agency}"),
            body: format!(
                "Hi {},\n\nThanks for getting in touch. One of our agents will reply shortly.\n\n{agency}",
                lead.name
            ),
            kind: EmailKind::LeadConfirmation,
            lead_id: Some(lead.id),
        })
        .await
    }

    pub async fn send_lead_notification(&self, lead: &Lead, to: &str, agency: &str) -> CrmResult<Email> {
        let mut body = format!(
            "New {} lead for {agency}.\n\nName: {}\nEmail: {}",
            lead.source, lead.name, lead.email
        );
        if let Some(phone) = &lead.phone {
            body.push_str(&format!("\nPhone: {phone}"));
        }
        if let Some(message) = &lead.message {
            body.push_str(&format!("\n\n{message}"));
        }

        self.send(CreateEmailRequest {
            to_address: to.to_string(),
            subject: format!("New lead: {}", lead.name),
            body,
            kind: EmailKind::LeadNotification,
            lead_id: Some(lead.id),
        })
        .await
    }

    pub async fn list(&self, filter: EmailFilter) -> CrmResult<Page<Email>> {
        Ok(self.emails.list(&filter).await?)
    }

    pub async fn count_by_status(&self, status: EmailStatus) -> CrmResult<i64> {
        Ok(self.emails.count_by_status(status).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_database, FailingMailer, RecordingMailer};

    fn config() -> MailConfig {
        MailConfig {
            from_address: "hello@harbour.test".to_string(),
            from_name: "Harbour Homes".to_string(),
        }
    }

    #[tokio::test]
    async fn delivered_emails_are_marked_sent() {
        let (pool, _dir) = create_test_database().await;
        let mailer = Arc::new(RecordingMailer::default());
        let service = EmailService::new(pool, mailer.clone(), &config());

        let email = service.send_otp("lead@example.com", "042917", 10, "Harbour Homes").await.unwrap();
        assert_eq!(email.status, EmailStatus::Sent);
        assert!(email.sent_at.is_some());

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "Harbour Homes <hello@harbour.test>");
        assert!(sent[0].body.contains("042917"));
    }

    #[tokio::test]
    async fn failures_stay_in_the_outbox() {
        let (pool, _dir) = create_test_database().await;
        let service = EmailService::new(pool, Arc::new(FailingMailer), &config());

        let email = service.send_otp("lead@example.com", "000001", 10, "Harbour Homes").await.unwrap();
        assert_eq!(email.status, EmailStatus::Failed);
        assert!(email.error.as_deref().unwrap_or_default().contains("smtp unavailable"));

        let failed = service
            .list(EmailFilter {
                status: Some(EmailStatus::Failed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failed.total, 1);
        assert_eq!(service.count_by_status(EmailStatus::Sent).await.unwrap(), 0);
    }
}

//! Lead capture and lifecycle.

use realty_auth::password::is_valid_email;
use realty_database::{
    CreateLeadRequest, Lead, LeadFilter, LeadRepository, LeadSource, LeadStatus, Page,
    UpdateLeadRequest,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{CrmError, CrmResult};
use crate::services::{CrmConfigService, EmailService};

const MAX_NAME_CHARS: usize = 200;
const MAX_MESSAGE_CHARS: usize = 5000;

/// A submission from the public contact or property inquiry form.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
    #[serde(default)]
    pub property_id: Option<i64>,
    #[serde(default)]
    pub source: Option<LeadSource>,
}

pub(crate) fn clean_name(name: &str) -> CrmResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CrmError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(CrmError::validation("name is too long"));
    }
    Ok(name.to_string())
}

pub(crate) fn clean_email(email: &str) -> CrmResult<String> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(CrmError::validation("a valid email address is required"));
    }
    Ok(email)
}

pub(crate) fn clean_phone(phone: Option<String>) -> Option<String> {
    phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())
}

#[derive(Clone)]
pub struct LeadService {
    leads: LeadRepository,
    emails: EmailService,
    settings: CrmConfigService,
}

impl LeadService {
    pub fn new(pool: SqlitePool, emails: EmailService, settings: CrmConfigService) -> Self {
        Self {
            leads: LeadRepository::new(pool),
            emails,
            settings,
        }
    }

    /// Create a `new` lead from a form submission and send the follow-up emails.
    pub async fn capture_contact(&self, form: ContactForm) -> CrmResult<Lead> {
        let name = clean_name(&form.name)?;
        let email = clean_email(&form.email)?;
        let message = form.message.trim();
        if message.is_empty() {
            return Err(CrmError::validation("message is required"));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(CrmError::validation("message is too long"));
        }

        let settings = self.settings.get().await?;
        let lead = self
            .leads
            .create(&CreateLeadRequest {
                name,
                email,
                phone: clean_phone(form.phone),
                message: Some(message.to_string()),
                source: form.source.unwrap_or(LeadSource::ContactForm),
                property_id: form.property_id,
                assigned_to: settings.default_assignee_id,
                email_verified: false,
            })
            .await?;

        if let Err(err) = self.emails.send_lead_confirmation(&lead, &settings.agency_name).await {
            warn!(lead = %lead.public_id, error = %err, "could not queue lead confirmation");
        }
        if settings.notify_on_new_lead {
            if let Some(to) = settings.contact_email.as_deref() {
                if let Err(err) = self.emails.send_lead_notification(&lead, to, &settings.agency_name).await {
                    warn!(lead = %lead.public_id, error = %err, "could not queue lead notification");
                }
            }
        }

        Ok(lead)
    }

    /// The lead behind a verified email, created on first verification.
    pub async fn find_or_create_verified(
        &self,
        name: Option<&str>,
        email: &str,
        phone: Option<String>,
    ) -> CrmResult<Lead> {
        let email = clean_email(email)?;
        let name = name.map(str::trim).filter(|n| !n.is_empty()).map(clean_name).transpose()?;
        let phone = clean_phone(phone);

        if let Some(mut lead) = self.leads.find_latest_by_email(&email).await? {
            // Details given at verification fill in what the earlier form left out.
            let update = UpdateLeadRequest {
                name: name.filter(|_| lead.name.trim().is_empty()),
                phone: phone.filter(|p| lead.phone.as_deref() != Some(p.as_str())),
                ..Default::default()
            };
            if update.name.is_some() || update.phone.is_some() {
                lead = self.leads.update(lead.id, &update).await?;
            }
            if lead.email_verified {
                return Ok(lead);
            }
            let lead = self.leads.mark_verified(lead.id).await?;
            info!(lead = %lead.public_id, "verified existing lead");
            return Ok(lead);
        }

        let name = name.unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
        let settings = self.settings.get().await?;
        let lead = self
            .leads
            .create(&CreateLeadRequest {
                name,
                email,
                phone,
                message: None,
                source: LeadSource::Chat,
                property_id: None,
                assigned_to: settings.default_assignee_id,
                email_verified: true,
            })
            .await?;

        if settings.notify_on_new_lead {
            if let Some(to) = settings.contact_email.as_deref() {
                if let Err(err) = self.emails.send_lead_notification(&lead, to, &settings.agency_name).await {
                    warn!(lead = %lead.public_id, error = %err, "could not queue lead notification");
                }
            }
        }
        Ok(lead)
    }

    /// Change status; the lead goes to the bottom of its new column.
    pub async fn update_status(&self, public_id: &str, status: LeadStatus) -> CrmResult<Lead> {
        let lead = self.get(public_id).await?;
        if lead.status == status {
            return Ok(lead);
        }
        let moved = self.leads.move_on_board(lead.id, status, i64::MAX).await?;
        info!(lead = %moved.public_id, from = %lead.status, to = %status, "lead status changed");
        Ok(moved)
    }

    pub async fn update(&self, public_id: &str, update: UpdateLeadRequest) -> CrmResult<Lead> {
        let lead = self.get(public_id).await?;
        let update = UpdateLeadRequest {
            name: update.name.as_deref().map(clean_name).transpose()?,
            phone: update.phone.map(|p| p.trim().to_string()),
            ..update
        };
        Ok(self.leads.update(lead.id, &update).await?)
    }

    pub async fn assign(&self, public_id: &str, assignee: Option<i64>) -> CrmResult<Lead> {
        let mut lead = self.get(public_id).await?;
        self.leads.assign(lead.id, assignee).await?;
        lead.assigned_to = assignee;
        Ok(lead)
    }

    pub async fn delete(&self, public_id: &str) -> CrmResult<()> {
        let lead = self.get(public_id).await?;
        self.leads.delete(lead.id).await?;
        info!(lead = %lead.public_id, "deleted lead");
        Ok(())
    }

    pub async fn list(&self, filter: LeadFilter) -> CrmResult<Page<Lead>> {
        Ok(self.leads.list(&filter).await?)
    }

    pub async fn get(&self, public_id: &str) -> CrmResult<Lead> {
        self.leads
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| CrmError::not_found("lead"))
    }

    pub async fn find_by_id(&self, id: i64) -> CrmResult<Option<Lead>> {
        Ok(self.leads.find_by_id(id).await?)
    }

    pub async fn count_by_status(&self) -> CrmResult<Vec<(LeadStatus, i64)>> {
        Ok(self.leads.count_by_status().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_database, services_with_recorder};
    use realty_database::{EmailKind, UpdateCrmConfigRequest};

    fn form(email: &str) -> ContactForm {
        ContactForm {
            name: " Dana Reyes ".to_string(),
            email: email.to_string(),
            phone: Some("  ".to_string()),
            message: "Is the loft still available?".to_string(),
            property_id: None,
            source: None,
        }
    }

    #[tokio::test]
    async fn capture_contact_creates_new_lead_and_emails() {
        let (pool, _dir) = create_test_database().await;
        let (services, mailer) = services_with_recorder(pool);
        services
            .settings
            .update(UpdateCrmConfigRequest {
                agency_name: Some("Harbour Homes".to_string()),
                contact_email: Some("team@harbour.test".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let lead = services.leads.capture_contact(form("Dana@Example.com")).await.unwrap();
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.name, "Dana Reyes");
        assert_eq!(lead.email, "dana@example.com");
        assert_eq!(lead.phone, None);
        assert_eq!(lead.source, LeadSource::ContactForm);
        assert!(!lead.email_verified);

        let sent = mailer.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "dana@example.com");
        assert_eq!(sent[1].to, "team@harbour.test");

        let outbox = services.emails.list(Default::default()).await.unwrap();
        let kinds: Vec<EmailKind> = outbox.items.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EmailKind::LeadConfirmation));
        assert!(kinds.contains(&EmailKind::LeadNotification));
    }

    #[tokio::test]
    async fn capture_contact_validates_input() {
        let (pool, _dir) = create_test_database().await;
        let (services, _) = services_with_recorder(pool);

        let mut missing_name = form("dana@example.com");
        missing_name.name = "  ".to_string();
        assert!(matches!(
            services.leads.capture_contact(missing_name).await,
            Err(CrmError::Validation(_))
        ));

        assert!(matches!(
            services.leads.capture_contact(form("dana-at-example")).await,
            Err(CrmError::Validation(_))
        ));

        let mut empty_message = form("dana@example.com");
        empty_message.message = "\n".to_string();
        assert!(matches!(
            services.leads.capture_contact(empty_message).await,
            Err(CrmError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn find_or_create_verified_reuses_existing_lead() {
        let (pool, _dir) = create_test_database().await;
        let (services, _) = services_with_recorder(pool);

        let captured = services.leads.capture_contact(form("dana@example.com")).await.unwrap();
        let verified = services
            .leads
            .find_or_create_verified(Some("Dana"), "DANA@example.com", None)
            .await
            .unwrap();
        assert_eq!(verified.id, captured.id);
        assert!(verified.email_verified);
        assert!(verified.verified_at.is_some());

        let fresh = services
            .leads
            .find_or_create_verified(None, "sam@example.com", Some("555-0100".to_string()))
            .await
            .unwrap();
        assert_eq!(fresh.name, "sam");
        assert_eq!(fresh.source, LeadSource::Chat);
        assert!(fresh.email_verified);
    }

    #[tokio::test]
    async fn verification_fills_in_the_phone_of_an_existing_lead() {
        let (pool, _dir) = create_test_database().await;
        let (services, _) = services_with_recorder(pool);

        let captured = services.leads.capture_contact(form("dana@example.com")).await.unwrap();
        assert_eq!(captured.phone, None);

        let verified = services
            .leads
            .find_or_create_verified(Some("Someone Else"), "dana@example.com", Some(" +351 912 345 678 ".to_string()))
            .await
            .unwrap();
        assert_eq!(verified.id, captured.id);
        assert_eq!(verified.phone.as_deref(), Some("+351 912 345 678"));
        assert_eq!(verified.name, "Dana Reyes", "a name already on file is kept");
        assert!(verified.email_verified);

        let stored = services.leads.get(&captured.public_id).await.unwrap();
        assert_eq!(stored.phone.as_deref(), Some("+351 912 345 678"));
        assert!(stored.email_verified);

        // Verifying again without a phone keeps the number on file.
        let again = services
            .leads
            .find_or_create_verified(None, "dana@example.com", None)
            .await
            .unwrap();
        assert_eq!(again.phone.as_deref(), Some("+351 912 345 678"));
    }

    #[tokio::test]
    async fn status_changes_append_to_column_and_track_closing() {
        let (pool, _dir) = create_test_database().await;
        let (services, _) = services_with_recorder(pool);

        let first = services.leads.capture_contact(form("a@example.com")).await.unwrap();
        let second = services.leads.capture_contact(form("b@example.com")).await.unwrap();

        let a = services.leads.update_status(&first.public_id, LeadStatus::Contacted).await.unwrap();
        let b = services.leads.update_status(&second.public_id, LeadStatus::Contacted).await.unwrap();
        assert_eq!(a.board_position, 0);
        assert_eq!(b.board_position, 1);

        let won = services.leads.update_status(&first.public_id, LeadStatus::Won).await.unwrap();
        assert!(won.closed_at.is_some());
        let reopened = services.leads.update_status(&first.public_id, LeadStatus::Qualified).await.unwrap();
        assert!(reopened.closed_at.is_none());

        let remaining = services.leads.get(&second.public_id).await.unwrap();
        assert_eq!(remaining.board_position, 0);
    }

    #[tokio::test]
    async fn update_assign_delete() {
        let (pool, _dir) = create_test_database().await;
        let (services, _) = services_with_recorder(pool);

        let lead = services.leads.capture_contact(form("a@example.com")).await.unwrap();
        let updated = services
            .leads
            .update(
                &lead.public_id,
                UpdateLeadRequest {
                    notes: Some("Prefers mornings".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("Prefers mornings"));

        let blank = UpdateLeadRequest {
            name: Some("".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            services.leads.update(&lead.public_id, blank).await,
            Err(CrmError::Validation(_))
        ));

        let unassigned = services.leads.assign(&lead.public_id, None).await.unwrap();
        assert_eq!(unassigned.assigned_to, None);

        services.leads.delete(&lead.public_id).await.unwrap();
        assert!(matches!(services.leads.get(&lead.public_id).await, Err(CrmError::NotFound(_))));
        assert!(matches!(services.leads.delete(&lead.public_id).await, Err(CrmError::NotFound(_))));
    }
}

use realty_catalog::{PostService, PropertyService};
use realty_database::{
    ConversationRepository, EmailStatus, LeadRepository, LeadStatus, PropertyStatus,
};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::CrmResult;
use crate::services::EmailService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Headline numbers for the back-office home page.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub properties_by_status: Vec<StatusCount>,
    pub leads_by_status: Vec<StatusCount>,
    pub open_conversations: i64,
    pub published_posts: i64,
    pub queued_emails: i64,
    pub failed_emails: i64,
}

/// Every status in declaration order, zero when absent from `counts`.
fn fill<S: Copy + PartialEq + ToString>(all: &[S], counts: &[(S, i64)]) -> Vec<StatusCount> {
    all.iter()
        .map(|status| StatusCount {
            status: status.to_string(),
            count: counts
                .iter()
                .find(|(s, _)| s == status)
                .map(|(_, count)| *count)
                .unwrap_or(0),
        })
        .collect()
}

#[derive(Clone)]
pub struct DashboardService {
    properties: PropertyService,
    posts: PostService,
    leads: LeadRepository,
    conversations: ConversationRepository,
    emails: EmailService,
}

impl DashboardService {
    pub fn new(pool: SqlitePool, emails: EmailService) -> Self {
        Self {
            properties: PropertyService::new(pool.clone()),
            posts: PostService::new(pool.clone()),
            leads: LeadRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool),
            emails,
        }
    }

    pub async fn overview(&self) -> CrmResult<DashboardOverview> {
        let properties = self.properties.count_by_status().await?;
        let leads = self.leads.count_by_status().await?;

        Ok(DashboardOverview {
            properties_by_status: fill(PropertyStatus::ALL, &properties),
            leads_by_status: fill(LeadStatus::ALL, &leads),
            open_conversations: self.conversations.count_open().await?,
            published_posts: self.posts.count_published().await?,
            queued_emails: self.emails.count_by_status(EmailStatus::Queued).await?,
            failed_emails: self.emails.count_by_status(EmailStatus::Failed).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_database, services_with_recorder};
    use crate::ContactForm;

    #[tokio::test]
    async fn empty_dashboard_lists_every_status() {
        let (pool, _dir) = create_test_database().await;
        let (services, _) = services_with_recorder(pool);

        let overview = services.dashboard.overview().await.unwrap();
        assert_eq!(overview.properties_by_status.len(), PropertyStatus::ALL.len());
        assert_eq!(overview.leads_by_status.len(), LeadStatus::ALL.len());
        assert!(overview.leads_by_status.iter().all(|c| c.count == 0));
        assert_eq!(overview.open_conversations, 0);
        assert_eq!(overview.failed_emails, 0);
    }

    #[tokio::test]
    async fn counts_follow_activity() {
        let (pool, _dir) = create_test_database().await;
        let (services, _) = services_with_recorder(pool);

        let lead = services
            .leads
            .capture_contact(ContactForm {
                name: "Dana".to_string(),
                email: "dana@example.com".to_string(),
                phone: None,
                message: "Hello".to_string(),
                property_id: None,
                source: None,
            })
            .await
            .unwrap();
        services.conversations.open_for_lead(&lead).await.unwrap();

        let overview = services.dashboard.overview().await.unwrap();
        assert_eq!(
            overview.leads_by_status[0],
            StatusCount {
                status: "new".to_string(),
                count: 1
            }
        );
        assert_eq!(overview.open_conversations, 1);
        assert_eq!(overview.queued_emails, 0);
    }
}

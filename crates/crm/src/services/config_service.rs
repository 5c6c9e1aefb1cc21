use realty_auth::password::is_valid_email;
use realty_database::{now_timestamp, CrmConfig, CrmConfigRepository, UpdateCrmConfigRequest};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{CrmError, CrmResult};

/// Agency-wide CRM settings, a single row.
#[derive(Clone)]
pub struct CrmConfigService {
    configs: CrmConfigRepository,
}

impl CrmConfigService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            configs: CrmConfigRepository::new(pool),
        }
    }

    /// Defaults until an admin saves settings for the first time.
    pub async fn get(&self) -> CrmResult<CrmConfig> {
        Ok(self.configs.get().await?.unwrap_or_default())
    }

    pub async fn update(&self, update: UpdateCrmConfigRequest) -> CrmResult<CrmConfig> {
        if update.agency_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CrmError::validation("agency name must not be empty"));
        }
        if let Some(email) = update.contact_email.as_deref() {
            if !update.clear_contact_email && !is_valid_email(email.trim()) {
                return Err(CrmError::validation("contact email is not a valid address"));
            }
        }

        let update = UpdateCrmConfigRequest {
            agency_name: update.agency_name.map(|n| n.trim().to_string()),
            contact_email: update.contact_email.map(|e| e.trim().to_lowercase()),
            ..update
        };

        let mut config = self.get().await?;
        config.apply(update, &now_timestamp());
        self.configs.upsert(&config).await?;
        info!(agency = %config.agency_name, "updated crm settings");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_database;

    #[tokio::test]
    async fn defaults_then_partial_updates() {
        let (pool, _dir) = create_test_database().await;
        let service = CrmConfigService::new(pool);

        let defaults = service.get().await.unwrap();
        assert_eq!(defaults, CrmConfig::default());

        let updated = service
            .update(UpdateCrmConfigRequest {
                agency_name: Some("  Harbour Homes ".to_string()),
                contact_email: Some("Team@Harbour.test".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.agency_name, "Harbour Homes");
        assert_eq!(updated.contact_email.as_deref(), Some("team@harbour.test"));

        let again = service
            .update(UpdateCrmConfigRequest {
                assistant_enabled: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(again.agency_name, "Harbour Homes");
        assert!(!again.assistant_enabled);
        assert_eq!(service.get().await.unwrap(), again);
    }

    #[tokio::test]
    async fn rejects_bad_values() {
        let (pool, _dir) = create_test_database().await;
        let service = CrmConfigService::new(pool);

        let blank = UpdateCrmConfigRequest {
            agency_name: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(matches!(service.update(blank).await, Err(CrmError::Validation(_))));

        let bad_email = UpdateCrmConfigRequest {
            contact_email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert!(matches!(service.update(bad_email).await, Err(CrmError::Validation(_))));
    }
}

//! Singleton row holding agency CRM settings.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::entities::CrmConfig;
use crate::types::DatabaseResult;

#[derive(Clone)]
pub struct CrmConfigRepository {
    pool: SqlitePool,
}

fn map_config(row: &SqliteRow) -> DatabaseResult<CrmConfig> {
    Ok(CrmConfig {
        agency_name: row.try_get("agency_name")?,
        contact_email: row.try_get("contact_email")?,
        notify_on_new_lead: row.try_get("notify_on_new_lead")?,
        default_assignee_id: row.try_get("default_assignee_id")?,
        assistant_enabled: row.try_get("assistant_enabled")?,
        assistant_greeting: row.try_get("assistant_greeting")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl CrmConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// `None` until the settings have been saved once.
    pub async fn get(&self) -> DatabaseResult<Option<CrmConfig>> {
        let row = sqlx::query(
            "SELECT agency_name, contact_email, notify_on_new_lead, default_assignee_id, assistant_enabled,
                assistant_greeting, updated_at
             FROM crm_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_config).transpose()
    }

    pub async fn upsert(&self, config: &CrmConfig) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO crm_config (id, agency_name, contact_email, notify_on_new_lead, default_assignee_id,
                assistant_enabled, assistant_greeting, updated_at)
             VALUES (1, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                agency_name = excluded.agency_name,
                contact_email = excluded.contact_email,
                notify_on_new_lead = excluded.notify_on_new_lead,
                default_assignee_id = excluded.default_assignee_id,
                assistant_enabled = excluded.assistant_enabled,
                assistant_greeting = excluded.assistant_greeting,
                updated_at = excluded.updated_at",
        )
        .bind(&config.agency_name)
        .bind(&config.contact_email)
        .bind(config.notify_on_new_lead)
        .bind(config.default_assignee_id)
        .bind(config.assistant_enabled)
        .bind(&config.assistant_greeting)
        .bind(&config.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

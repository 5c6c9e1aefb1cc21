//! Repository for lead conversations.

use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;

use crate::entities::message::preview;
use crate::entities::{Conversation, ConversationFilter, ConversationStatus, Message, NewMessage};
use crate::repos::message_repository::insert_message;
use crate::time::now_timestamp;
use crate::types::{page_bounds, DatabaseError, DatabaseResult, Page};

const CONVERSATION_COLUMNS: &str = "id, public_id, lead_id, status, assistant_enabled, last_message_id, \
     last_message_preview, last_message_at, message_count, created_at, updated_at";

#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

fn map_conversation(row: &SqliteRow) -> DatabaseResult<Conversation> {
    let status: String = row.try_get("status")?;

    Ok(Conversation {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        lead_id: row.try_get("lead_id")?,
        status: status.parse()?,
        assistant_enabled: row.try_get("assistant_enabled")?,
        last_message_id: row.try_get("last_message_id")?,
        last_message_preview: row.try_get("last_message_preview")?,
        last_message_at: row.try_get("last_message_at")?,
        message_count: row.try_get("message_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ConversationFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(lead_id) = filter.lead_id {
        qb.push(" AND lead_id = ").push_bind(lead_id);
    }
}

async fn insert_conversation(
    conn: &mut SqliteConnection,
    lead_id: i64,
    assistant_enabled: bool,
) -> DatabaseResult<Conversation> {
    let public_id = cuid2::cuid();
    let now = now_timestamp();

    let result = sqlx::query(
        "INSERT INTO conversations (public_id, lead_id, status, assistant_enabled, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&public_id)
    .bind(lead_id)
    .bind(ConversationStatus::Open.as_str())
    .bind(assistant_enabled)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "conversation"))?;

    Ok(Conversation {
        id: result.last_insert_rowid(),
        public_id,
        lead_id,
        status: ConversationStatus::Open,
        assistant_enabled,
        last_message_id: None,
        last_message_preview: None,
        last_message_at: None,
        message_count: 0,
        created_at: now.clone(),
        updated_at: now,
    })
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a conversation whose first message is `greeting`. Neither row is
    /// written unless both are.
    pub async fn create_with_greeting(
        &self,
        lead_id: i64,
        assistant_enabled: bool,
        greeting: &NewMessage,
    ) -> DatabaseResult<(Conversation, Message)> {
        let mut tx = self.pool.begin().await?;
        let mut conversation = insert_conversation(&mut tx, lead_id, assistant_enabled).await?;
        let message = insert_message(&mut tx, conversation.id, greeting).await?;
        tx.commit().await?;

        conversation.last_message_id = Some(message.id);
        conversation.last_message_preview = Some(preview(&message.content));
        conversation.last_message_at = Some(message.created_at.clone());
        conversation.message_count = 1;
        conversation.updated_at = message.created_at.clone();

        info!(conversation_id = conversation.id, lead_id, "opened conversation");
        Ok((conversation, message))
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Conversation>> {
        let row = sqlx::query(&format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_conversation).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_conversation).transpose()
    }

    /// Newest open conversation for a lead.
    pub async fn find_open_for_lead(&self, lead_id: i64) -> DatabaseResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE lead_id = ? AND status = ? ORDER BY id DESC LIMIT 1"
        ))
        .bind(lead_id)
        .bind(ConversationStatus::Open.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_conversation).transpose()
    }

    /// Most recently active first.
    pub async fn list(&self, filter: &ConversationFilter) -> DatabaseResult<Page<Conversation>> {
        let (limit, offset) = page_bounds(filter.limit, filter.offset);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM conversations");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query =
            QueryBuilder::<Sqlite>::new(format!("SELECT {CONVERSATION_COLUMNS} FROM conversations"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY COALESCE(last_message_at, created_at) DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let items = rows
            .iter()
            .map(map_conversation)
            .collect::<DatabaseResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub async fn set_assistant_enabled(&self, id: i64, enabled: bool) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE conversations SET assistant_enabled = ?, updated_at = ? WHERE id = ?")
            .bind(enabled)
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("conversation {id}")));
        }
        Ok(())
    }

    pub async fn set_status(&self, id: i64, status: ConversationStatus) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE conversations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("conversation {id}")));
        }
        Ok(())
    }

    pub async fn count_open(&self) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE status = ?")
            .bind(ConversationStatus::Open.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

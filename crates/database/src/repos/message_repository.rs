//! Repository for conversation messages.

use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::entities::message::preview;
use crate::entities::{Message, NewMessage};
use crate::time::now_timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const MESSAGE_COLUMNS: &str = "id, public_id, conversation_id, sender, sender_user_id, content, created_at";

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

fn map_message(row: &SqliteRow) -> DatabaseResult<Message> {
    let sender: String = row.try_get("sender")?;

    Ok(Message {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender: sender.parse()?,
        sender_user_id: row.try_get("sender_user_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Insert a message and update the conversation summary on `conn`.
/// The caller owns the transaction.
pub(crate) async fn insert_message(
    conn: &mut SqliteConnection,
    conversation_id: i64,
    message: &NewMessage,
) -> DatabaseResult<Message> {
    let public_id = cuid2::cuid();
    let now = now_timestamp();

    let result = sqlx::query(
        "INSERT INTO messages (public_id, conversation_id, sender, sender_user_id, content, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&public_id)
    .bind(conversation_id)
    .bind(message.sender.as_str())
    .bind(message.sender_user_id)
    .bind(&message.content)
    .bind(&now)
    .execute(&mut *conn)
    .await?;
    let id = result.last_insert_rowid();

    sqlx::query(
        "UPDATE conversations
         SET last_message_id = ?, last_message_preview = ?, last_message_at = ?,
             message_count = message_count + 1, updated_at = ?
         WHERE id = ?",
    )
    .bind(id)
    .bind(preview(&message.content))
    .bind(&now)
    .bind(&now)
    .bind(conversation_id)
    .execute(&mut *conn)
    .await?;

    debug!(conversation_id, message_id = id, sender = %message.sender, "appended message");

    Ok(Message {
        id,
        public_id,
        conversation_id,
        sender: message.sender,
        sender_user_id: message.sender_user_id,
        content: message.content.clone(),
        created_at: now,
    })
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a message and advance the conversation's last-message pointer
    /// in one transaction.
    pub async fn append(&self, conversation_id: i64, message: &NewMessage) -> DatabaseResult<Message> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(DatabaseError::NotFound(format!("conversation {conversation_id}")));
        }

        let stored = insert_message(&mut tx, conversation_id, message).await?;
        tx.commit().await?;
        Ok(stored)
    }

    /// Whole transcript, oldest first.
    pub async fn list_for_conversation(&self, conversation_id: i64) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ? ORDER BY id ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_message).collect()
    }

    /// The last `limit` messages, returned oldest first.
    pub async fn recent(&self, conversation_id: i64, limit: i64) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ? ORDER BY id DESC LIMIT ?"
        ))
        .bind(conversation_id)
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows.iter().map(map_message).collect::<DatabaseResult<Vec<_>>>()?;
        messages.reverse();
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{CreateLeadRequest, LeadSource, MessageSender};
    use crate::repos::{ConversationRepository, LeadRepository};
    use crate::test_support::create_test_database;

    async fn seed_conversation(pool: &SqlitePool) -> i64 {
        let lead = LeadRepository::new(pool.clone())
            .create(&CreateLeadRequest {
                name: "Omar".to_string(),
                email: "omar@example.com".to_string(),
                phone: None,
                message: None,
                source: LeadSource::Chat,
                property_id: None,
                assigned_to: None,
                email_verified: true,
            })
            .await
            .unwrap();
        ConversationRepository::new(pool.clone())
            .create_with_greeting(lead.id, true, &NewMessage::new(MessageSender::Assistant, "Hi Omar"))
            .await
            .unwrap()
            .0
            .id
    }

    #[tokio::test]
    async fn append_updates_the_conversation_summary() {
        let (pool, _dir) = create_test_database().await;
        let conversation_id = seed_conversation(&pool).await;
        let messages = MessageRepository::new(pool.clone());
        let conversations = ConversationRepository::new(pool);

        messages
            .append(conversation_id, &NewMessage::new(MessageSender::System, "Welcome"))
            .await
            .unwrap();
        let last = messages
            .append(
                conversation_id,
                &NewMessage::new(MessageSender::Lead, "Do you have anything with a garden?"),
            )
            .await
            .unwrap();

        let conversation = conversations.find_by_id(conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.message_count, 3);
        assert_eq!(conversation.last_message_id, Some(last.id));
        assert_eq!(
            conversation.last_message_preview.as_deref(),
            Some("Do you have anything with a garden?")
        );
        assert_eq!(conversation.last_message_at, Some(last.created_at));
    }

    #[tokio::test]
    async fn append_to_missing_conversation_is_not_found() {
        let (pool, _dir) = create_test_database().await;
        let messages = MessageRepository::new(pool);

        let err = messages
            .append(42, &NewMessage::new(MessageSender::Lead, "hello"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn recent_returns_the_tail_in_order() {
        let (pool, _dir) = create_test_database().await;
        let conversation_id = seed_conversation(&pool).await;
        let messages = MessageRepository::new(pool);

        for text in ["one", "two", "three", "four"] {
            messages
                .append(conversation_id, &NewMessage::new(MessageSender::Lead, text))
                .await
                .unwrap();
        }

        let tail: Vec<String> = messages
            .recent(conversation_id, 2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(tail, vec!["three", "four"]);
        assert_eq!(messages.list_for_conversation(conversation_id).await.unwrap().len(), 5);
    }
}

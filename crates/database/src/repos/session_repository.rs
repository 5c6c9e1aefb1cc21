//! Repository for back-office login sessions.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use crate::entities::AuthSession;
use crate::time::now_timestamp;
use crate::types::DatabaseResult;

#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

fn map_session(row: &SqliteRow) -> DatabaseResult<AuthSession> {
    Ok(AuthSession {
        id: row.try_get("id")?,
        token: row.try_get("token")?,
        user_id: row.try_get("user_id")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, token: &str, user_id: i64, expires_at: &str) -> DatabaseResult<AuthSession> {
        let now = now_timestamp();
        let result = sqlx::query(
            "INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(AuthSession {
            id: result.last_insert_rowid(),
            token: token.to_string(),
            user_id,
            expires_at: expires_at.to_string(),
            created_at: now,
        })
    }

    pub async fn find_by_token(&self, token: &str) -> DatabaseResult<Option<AuthSession>> {
        let row = sqlx::query(
            "SELECT id, token, user_id, expires_at, created_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_session).transpose()
    }

    pub async fn delete_by_token(&self, token: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_user(&self, user_id: i64) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove sessions whose expiry is at or before `now`.
    pub async fn delete_expired(&self, now: &str) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        debug!(removed = result.rows_affected(), "purged expired sessions");
        Ok(result.rows_affected())
    }
}

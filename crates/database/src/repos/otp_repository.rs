//! Storage for pending one-time passcodes, one per email address.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use crate::entities::OtpRecord;
use crate::types::DatabaseResult;

#[derive(Clone)]
pub struct OtpRepository {
    pool: SqlitePool,
}

fn map_otp(row: &SqliteRow) -> DatabaseResult<OtpRecord> {
    Ok(OtpRecord {
        email: row.try_get("email")?,
        code: row.try_get("code")?,
        expires_at: row.try_get("expires_at")?,
        attempts: row.try_get("attempts")?,
        last_sent_at: row.try_get("last_sent_at")?,
    })
}

impl OtpRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace any pending code for the address; attempts restart at zero.
    pub async fn upsert(&self, record: &OtpRecord) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO otp_codes (email, code, expires_at, attempts, last_sent_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(email) DO UPDATE SET
                code = excluded.code,
                expires_at = excluded.expires_at,
                attempts = excluded.attempts,
                last_sent_at = excluded.last_sent_at",
        )
        .bind(&record.email)
        .bind(&record.code)
        .bind(&record.expires_at)
        .bind(record.attempts)
        .bind(&record.last_sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, email: &str) -> DatabaseResult<Option<OtpRecord>> {
        let row = sqlx::query(
            "SELECT email, code, expires_at, attempts, last_sent_at FROM otp_codes WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_otp).transpose()
    }

    /// Returns the attempt count after the increment, or `None` if no code is
    /// pending or `max_attempts` were already spent.
    pub async fn increment_attempts(&self, email: &str, max_attempts: i64) -> DatabaseResult<Option<i64>> {
        let attempts: Option<i64> = sqlx::query_scalar(
            "UPDATE otp_codes SET attempts = attempts + 1
             WHERE email = ? AND attempts < ?
             RETURNING attempts",
        )
        .bind(email)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await?;
        Ok(attempts)
    }

    /// Delete the code if it matches and has not expired. Only one caller can win.
    pub async fn consume(&self, email: &str, code: &str, now: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE email = ? AND code = ? AND expires_at > ?")
            .bind(email)
            .bind(code)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete(&self, email: &str) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE email = ?")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_expired(&self, now: &str) -> DatabaseResult<u64> {
        let result = sqlx::query("DELETE FROM otp_codes WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        debug!(removed = result.rows_affected(), "purged expired passcodes");
        Ok(result.rows_affected())
    }
}

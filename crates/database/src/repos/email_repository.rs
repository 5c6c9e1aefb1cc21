//! Outbox of emails sent by the agency.

use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};

use crate::entities::{CreateEmailRequest, Email, EmailFilter, EmailStatus};
use crate::time::now_timestamp;
use crate::types::{page_bounds, DatabaseError, DatabaseResult, Page};

const EMAIL_COLUMNS: &str =
    "id, public_id, to_address, subject, body, kind, status, lead_id, error, sent_at, created_at, updated_at";

#[derive(Clone)]
pub struct EmailRepository {
    pool: SqlitePool,
}

fn map_email(row: &SqliteRow) -> DatabaseResult<Email> {
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;

    Ok(Email {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        to_address: row.try_get("to_address")?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        kind: kind.parse()?,
        status: status.parse()?,
        lead_id: row.try_get("lead_id")?,
        error: row.try_get("error")?,
        sent_at: row.try_get("sent_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &EmailFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(lead_id) = filter.lead_id {
        qb.push(" AND lead_id = ").push_bind(lead_id);
    }
}

impl EmailRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record an email in the `queued` state.
    pub async fn create(&self, request: &CreateEmailRequest) -> DatabaseResult<Email> {
        let public_id = cuid2::cuid();
        let now = now_timestamp();

        let result = sqlx::query(
            "INSERT INTO emails (public_id, to_address, subject, body, kind, status, lead_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&request.to_address)
        .bind(&request.subject)
        .bind(&request.body)
        .bind(request.kind.as_str())
        .bind(EmailStatus::Queued.as_str())
        .bind(request.lead_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Email {
            id: result.last_insert_rowid(),
            public_id,
            to_address: request.to_address.clone(),
            subject: request.subject.clone(),
            body: request.body.clone(),
            kind: request.kind,
            status: EmailStatus::Queued,
            lead_id: request.lead_id,
            error: None,
            sent_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Email>> {
        let row = sqlx::query(&format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_email).transpose()
    }

    pub async fn mark_sent(&self, id: i64) -> DatabaseResult<()> {
        let now = now_timestamp();
        let result = sqlx::query(
            "UPDATE emails SET status = ?, sent_at = ?, error = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(EmailStatus::Sent.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("email {id}")));
        }
        Ok(())
    }

    pub async fn mark_failed(&self, id: i64, error: &str) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE emails SET status = ?, error = ?, updated_at = ? WHERE id = ?")
            .bind(EmailStatus::Failed.as_str())
            .bind(error)
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("email {id}")));
        }
        Ok(())
    }

    pub async fn list(&self, filter: &EmailFilter) -> DatabaseResult<Page<Email>> {
        let (limit, offset) = page_bounds(filter.limit, filter.offset);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM emails");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {EMAIL_COLUMNS} FROM emails"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(map_email).collect::<DatabaseResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub async fn count_by_status(&self, status: EmailStatus) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM emails WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EmailKind;
    use crate::test_support::create_test_database;

    fn request(kind: EmailKind) -> CreateEmailRequest {
        CreateEmailRequest {
            to_address: "buyer@example.com".to_string(),
            subject: "Your code".to_string(),
            body: "123456".to_string(),
            kind,
            lead_id: None,
        }
    }

    #[tokio::test]
    async fn outbox_tracks_delivery_state() {
        let (pool, _dir) = create_test_database().await;
        let repo = EmailRepository::new(pool);

        let sent = repo.create(&request(EmailKind::Otp)).await.unwrap();
        let failed = repo.create(&request(EmailKind::Generic)).await.unwrap();
        assert_eq!(sent.status, EmailStatus::Queued);

        repo.mark_sent(sent.id).await.unwrap();
        repo.mark_failed(failed.id, "smtp refused").await.unwrap();

        let stored = repo.find_by_id(sent.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EmailStatus::Sent);
        assert!(stored.sent_at.is_some());

        let failures = repo
            .list(&EmailFilter {
                status: Some(EmailStatus::Failed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failures.total, 1);
        assert_eq!(failures.items[0].error.as_deref(), Some("smtp refused"));
        assert_eq!(repo.count_by_status(EmailStatus::Queued).await.unwrap(), 0);
    }
}

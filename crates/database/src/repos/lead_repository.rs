//! Repository for leads and their position on the pipeline board.

use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;

use crate::entities::{CreateLeadRequest, Lead, LeadFilter, LeadStatus, UpdateLeadRequest};
use crate::time::now_timestamp;
use crate::types::{page_bounds, DatabaseError, DatabaseResult, Page};

const LEAD_COLUMNS: &str = "id, public_id, name, email, phone, message, source, status, property_id, \
     assigned_to, email_verified, verified_at, board_position, notes, closed_at, created_at, updated_at";

#[derive(Clone)]
pub struct LeadRepository {
    pool: SqlitePool,
}

fn map_lead(row: &SqliteRow) -> DatabaseResult<Lead> {
    let source: String = row.try_get("source")?;
    let status: String = row.try_get("status")?;

    Ok(Lead {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        message: row.try_get("message")?,
        source: source.parse()?,
        status: status.parse()?,
        property_id: row.try_get("property_id")?,
        assigned_to: row.try_get("assigned_to")?,
        email_verified: row.try_get("email_verified")?,
        verified_at: row.try_get("verified_at")?,
        board_position: row.try_get("board_position")?,
        notes: row.try_get("notes")?,
        closed_at: row.try_get("closed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &LeadFilter) {
    qb.push(" WHERE 1 = 1");

    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(source) = filter.source {
        qb.push(" AND source = ").push_bind(source.as_str());
    }
    if let Some(assigned_to) = filter.assigned_to {
        qb.push(" AND assigned_to = ").push_bind(assigned_to);
    }
    if let Some(search) = filter.search.as_ref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR email LIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone LIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl LeadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a lead at the bottom of the `new` column.
    pub async fn create(&self, request: &CreateLeadRequest) -> DatabaseResult<Lead> {
        let public_id = cuid2::cuid();
        let now = now_timestamp();
        let email = request.email.trim().to_lowercase();
        let verified_at = request.email_verified.then(|| now.clone());

        let mut tx = self.pool.begin().await?;

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(board_position) + 1, 0) FROM leads WHERE status = ?",
        )
        .bind(LeadStatus::New.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let result = sqlx::query(
            "INSERT INTO leads (public_id, name, email, phone, message, source, status, property_id, assigned_to,
                email_verified, verified_at, board_position, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&request.name)
        .bind(&email)
        .bind(&request.phone)
        .bind(&request.message)
        .bind(request.source.as_str())
        .bind(LeadStatus::New.as_str())
        .bind(request.property_id)
        .bind(request.assigned_to)
        .bind(request.email_verified)
        .bind(&verified_at)
        .bind(position)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let id = result.last_insert_rowid();
        info!(lead_id = id, public_id = %public_id, source = %request.source, "created lead");

        Ok(Lead {
            id,
            public_id,
            name: request.name.clone(),
            email,
            phone: request.phone.clone(),
            message: request.message.clone(),
            source: request.source,
            status: LeadStatus::New,
            property_id: request.property_id,
            assigned_to: request.assigned_to,
            email_verified: request.email_verified,
            verified_at,
            board_position: position,
            notes: None,
            closed_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Lead>> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_lead).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Lead>> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_lead).transpose()
    }

    /// Most recent lead captured for an email address.
    pub async fn find_latest_by_email(&self, email: &str) -> DatabaseResult<Option<Lead>> {
        let row = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE email = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_lead).transpose()
    }

    pub async fn list(&self, filter: &LeadFilter) -> DatabaseResult<Page<Lead>> {
        let (limit, offset) = page_bounds(filter.limit, filter.offset);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM leads");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {LEAD_COLUMNS} FROM leads"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(map_lead).collect::<DatabaseResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Every lead ordered by column then position.
    pub async fn board(&self) -> DatabaseResult<Vec<Lead>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads ORDER BY status, board_position ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_lead).collect()
    }

    pub async fn update(&self, id: i64, request: &UpdateLeadRequest) -> DatabaseResult<Lead> {
        let mut lead = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("lead {id}")))?;

        let update = request.clone();
        if let Some(name) = update.name {
            lead.name = name;
        }
        if update.phone.is_some() {
            lead.phone = update.phone;
        }
        if update.message.is_some() {
            lead.message = update.message;
        }
        if update.notes.is_some() {
            lead.notes = update.notes;
        }
        if update.property_id.is_some() {
            lead.property_id = update.property_id;
        }
        lead.updated_at = now_timestamp();

        sqlx::query(
            "UPDATE leads SET name = ?, phone = ?, message = ?, notes = ?, property_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.message)
        .bind(&lead.notes)
        .bind(lead.property_id)
        .bind(&lead.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(lead)
    }

    pub async fn mark_verified(&self, id: i64) -> DatabaseResult<Lead> {
        let mut lead = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("lead {id}")))?;
        lead.mark_verified(&now_timestamp());

        sqlx::query("UPDATE leads SET email_verified = 1, verified_at = ?, updated_at = ? WHERE id = ?")
            .bind(&lead.verified_at)
            .bind(&lead.updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(lead)
    }

    pub async fn assign(&self, id: i64, assignee: Option<i64>) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE leads SET assigned_to = ?, updated_at = ? WHERE id = ?")
            .bind(assignee)
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("lead {id}")));
        }
        Ok(())
    }

    /// Move a lead to `index` within the `status` column.
    ///
    /// Positions in both columns stay contiguous from zero. `index` is clamped
    /// to the size of the target column, so `i64::MAX` appends.
    pub async fn move_on_board(&self, id: i64, status: LeadStatus, index: i64) -> DatabaseResult<Lead> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status, board_position FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("lead {id}")))?;
        let previous_status: String = row.try_get("status")?;
        let previous_position: i64 = row.try_get("board_position")?;

        sqlx::query(
            "UPDATE leads SET board_position = board_position - 1
             WHERE status = ? AND board_position > ? AND id != ?",
        )
        .bind(&previous_status)
        .bind(previous_position)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let column_len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leads WHERE status = ? AND id != ?")
            .bind(status.as_str())
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let index = index.clamp(0, column_len);

        sqlx::query(
            "UPDATE leads SET board_position = board_position + 1
             WHERE status = ? AND board_position >= ? AND id != ?",
        )
        .bind(status.as_str())
        .bind(index)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let now = now_timestamp();
        sqlx::query(
            "UPDATE leads SET status = ?, board_position = ?,
                closed_at = CASE WHEN ? THEN COALESCE(closed_at, ?) ELSE NULL END,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(index)
        .bind(status.is_closed())
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            lead_id = id,
            from = %previous_status,
            to = %status,
            position = index,
            "moved lead on board"
        );

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("lead {id}")))
    }

    pub async fn delete(&self, id: i64) -> DatabaseResult<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status, board_position FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("lead {id}")))?;
        let status: String = row.try_get("status")?;
        let position: i64 = row.try_get("board_position")?;

        sqlx::query("DELETE FROM leads WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE leads SET board_position = board_position - 1 WHERE status = ? AND board_position > ?")
            .bind(&status)
            .bind(position)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(lead_id = id, "deleted lead");
        Ok(())
    }

    pub async fn count_by_status(&self) -> DatabaseResult<Vec<(LeadStatus, i64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS total FROM leads GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> DatabaseResult<(LeadStatus, i64)> {
                let status: String = row.try_get("status")?;
                Ok((status.parse()?, row.try_get("total")?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::LeadSource;
    use crate::test_support::create_test_database;

    fn request(name: &str) -> CreateLeadRequest {
        CreateLeadRequest {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            message: Some("Interested in a viewing".to_string()),
            source: LeadSource::ContactForm,
            property_id: None,
            assigned_to: None,
            email_verified: false,
        }
    }

    async fn column(repo: &LeadRepository, status: LeadStatus) -> Vec<(String, i64)> {
        repo.board()
            .await
            .unwrap()
            .into_iter()
            .filter(|lead| lead.status == status)
            .map(|lead| (lead.name, lead.board_position))
            .collect()
    }

    #[tokio::test]
    async fn create_appends_to_new_column() {
        let (pool, _dir) = create_test_database().await;
        let repo = LeadRepository::new(pool);

        let first = repo.create(&request("Ana")).await.unwrap();
        let second = repo.create(&request("Ben")).await.unwrap();

        assert_eq!(first.board_position, 0);
        assert_eq!(second.board_position, 1);
        assert_eq!(first.email, "ana@example.com");
        assert!(first.verified_at.is_none());
    }

    #[tokio::test]
    async fn move_on_board_keeps_columns_contiguous() {
        let (pool, _dir) = create_test_database().await;
        let repo = LeadRepository::new(pool);

        let ana = repo.create(&request("Ana")).await.unwrap();
        let ben = repo.create(&request("Ben")).await.unwrap();
        let cid = repo.create(&request("Cid")).await.unwrap();

        repo.move_on_board(ben.id, LeadStatus::Contacted, 0).await.unwrap();
        repo.move_on_board(ana.id, LeadStatus::Contacted, 0).await.unwrap();

        assert_eq!(column(&repo, LeadStatus::New).await, vec![("Cid".to_string(), 0)]);
        assert_eq!(
            column(&repo, LeadStatus::Contacted).await,
            vec![("Ana".to_string(), 0), ("Ben".to_string(), 1)]
        );

        // Index past the end appends.
        repo.move_on_board(cid.id, LeadStatus::Contacted, 99).await.unwrap();
        assert_eq!(
            column(&repo, LeadStatus::Contacted).await,
            vec![("Ana".to_string(), 0), ("Ben".to_string(), 1), ("Cid".to_string(), 2)]
        );

        // Reorder within the same column.
        repo.move_on_board(cid.id, LeadStatus::Contacted, 0).await.unwrap();
        assert_eq!(
            column(&repo, LeadStatus::Contacted).await,
            vec![("Cid".to_string(), 0), ("Ana".to_string(), 1), ("Ben".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn closing_columns_stamp_closed_at() {
        let (pool, _dir) = create_test_database().await;
        let repo = LeadRepository::new(pool);

        let lead = repo.create(&request("Dee")).await.unwrap();
        let won = repo.move_on_board(lead.id, LeadStatus::Won, 0).await.unwrap();
        let closed_at = won.closed_at.clone().expect("closed_at set");

        let lost = repo.move_on_board(lead.id, LeadStatus::Lost, 0).await.unwrap();
        assert_eq!(lost.closed_at, Some(closed_at));

        let reopened = repo.move_on_board(lead.id, LeadStatus::Qualified, 0).await.unwrap();
        assert!(reopened.closed_at.is_none());
    }

    #[tokio::test]
    async fn delete_compacts_the_column() {
        let (pool, _dir) = create_test_database().await;
        let repo = LeadRepository::new(pool);

        let ana = repo.create(&request("Ana")).await.unwrap();
        repo.create(&request("Ben")).await.unwrap();
        repo.delete(ana.id).await.unwrap();

        assert_eq!(column(&repo, LeadStatus::New).await, vec![("Ben".to_string(), 0)]);
        assert!(repo.delete(ana.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn list_filters_by_search_and_status() {
        let (pool, _dir) = create_test_database().await;
        let repo = LeadRepository::new(pool);

        repo.create(&request("Ana")).await.unwrap();
        let ben = repo.create(&request("Ben")).await.unwrap();
        repo.move_on_board(ben.id, LeadStatus::Qualified, 0).await.unwrap();

        let page = repo
            .list(&LeadFilter { search: Some("ben@".to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let qualified = repo
            .list(&LeadFilter { status: Some(LeadStatus::Qualified), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(qualified.items[0].id, ben.id);

        let latest = repo.find_latest_by_email("BEN@example.com").await.unwrap().unwrap();
        assert_eq!(latest.id, ben.id);
    }
}

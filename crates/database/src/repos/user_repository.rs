//! Repository for back-office user accounts.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use crate::entities::{CreateUserRequest, User, UserStatus};
use crate::time::now_timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const USER_COLUMNS: &str = "id, public_id, email, display_name, role, status, password_hash, \
                            last_login_at, created_at, updated_at";

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

fn map_user(row: &SqliteRow) -> DatabaseResult<User> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;

    Ok(User {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        role: role.parse()?,
        status: status.parse()?,
        password_hash: row.try_get("password_hash")?,
        last_login_at: row.try_get("last_login_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: &CreateUserRequest) -> DatabaseResult<User> {
        let public_id = cuid2::cuid();
        let now = now_timestamp();
        let email = request.email.trim().to_lowercase();

        let result = sqlx::query(
            "INSERT INTO users (public_id, email, display_name, role, status, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&email)
        .bind(&request.display_name)
        .bind(request.role.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(&request.password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "user"))?;

        info!(user_id = result.last_insert_rowid(), public_id = %public_id, role = %request.role, "created user");

        Ok(User {
            id: result.last_insert_rowid(),
            public_id,
            email,
            display_name: request.display_name.clone(),
            role: request.role,
            status: UserStatus::Active,
            password_hash: request.password_hash.clone(),
            last_login_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_user).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_user).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_user).transpose()
    }

    pub async fn list(&self) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_user).collect()
    }

    pub async fn count_admins(&self) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn set_status(&self, id: i64, status: UserStatus) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    pub async fn set_password_hash(&self, id: i64, password_hash: &str) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    pub async fn touch_last_login(&self, id: i64) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::UserRole;
    use crate::test_support::create_test_database;

    fn request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            display_name: "Dana Agent".to_string(),
            role: UserRole::Agent,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn create_normalises_email_and_rejects_duplicates() {
        let (pool, _dir) = create_test_database().await;
        let repo = UserRepository::new(pool);

        let user = repo.create(&request("  Dana@Agency.TEST ")).await.unwrap();
        assert_eq!(user.email, "dana@agency.test");

        let found = repo.find_by_email("DANA@agency.test").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, UserRole::Agent);

        let duplicate = repo.create(&request("dana@agency.test")).await;
        assert!(matches!(duplicate, Err(DatabaseError::Duplicate(_))));
    }

    #[tokio::test]
    async fn set_status_reports_missing_users() {
        let (pool, _dir) = create_test_database().await;
        let repo = UserRepository::new(pool);

        let user = repo.create(&request("a@agency.test")).await.unwrap();
        repo.set_status(user.id, UserStatus::Disabled).await.unwrap();
        let stored = repo.find_by_public_id(&user.public_id).await.unwrap().unwrap();
        assert_eq!(stored.status, UserStatus::Disabled);

        assert!(repo.set_status(9_999, UserStatus::Active).await.unwrap_err().is_not_found());
    }
}

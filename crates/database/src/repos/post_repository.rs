//! Repository for blog posts.

use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use tracing::info;

use crate::entities::{CreatePostRequest, Post, PostFilter, PostStatus, UpdatePostRequest};
use crate::time::now_timestamp;
use crate::types::{page_bounds, DatabaseError, DatabaseResult, Page};

const POST_COLUMNS: &str = "id, public_id, title, slug, excerpt, content, cover_image_url, author_id, \
     status, tags, published_at, created_at, updated_at";

#[derive(Clone)]
pub struct PostRepository {
    pool: SqlitePool,
}

fn map_post(row: &SqliteRow) -> DatabaseResult<Post> {
    let status: String = row.try_get("status")?;
    let tags: String = row.try_get("tags")?;

    Ok(Post {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        excerpt: row.try_get("excerpt")?,
        content: row.try_get("content")?,
        cover_image_url: row.try_get("cover_image_url")?,
        author_id: row.try_get("author_id")?,
        status: status.parse()?,
        tags: serde_json::from_str(&tags)?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(tag) = filter.tag.as_ref().filter(|t| !t.trim().is_empty()) {
        // Tags are a JSON array of strings; match the quoted element.
        qb.push(" AND tags LIKE ")
            .push_bind(format!("%\"{}\"%", tag.trim()));
    }
}

impl PostRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a draft post.
    pub async fn create(&self, request: &CreatePostRequest) -> DatabaseResult<Post> {
        let public_id = cuid2::cuid();
        let now = now_timestamp();

        let result = sqlx::query(
            "INSERT INTO posts (public_id, title, slug, excerpt, content, cover_image_url, author_id, status, tags,
                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&request.title)
        .bind(&request.slug)
        .bind(&request.excerpt)
        .bind(&request.content)
        .bind(&request.cover_image_url)
        .bind(request.author_id)
        .bind(PostStatus::Draft.as_str())
        .bind(serde_json::to_string(&request.tags)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "post"))?;

        info!(post_id = result.last_insert_rowid(), slug = %request.slug, "created post");

        Ok(Post {
            id: result.last_insert_rowid(),
            public_id,
            title: request.title.clone(),
            slug: request.slug.clone(),
            excerpt: request.excerpt.clone(),
            content: request.content.clone(),
            cover_image_url: request.cover_image_url.clone(),
            author_id: request.author_id,
            status: PostStatus::Draft,
            tags: request.tags.clone(),
            published_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_post).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_post).transpose()
    }

    pub async fn find_by_slug(&self, slug: &str) -> DatabaseResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_post).transpose()
    }

    pub async fn slug_exists(&self, slug: &str) -> DatabaseResult<bool> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM posts WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(exists.is_some())
    }

    /// Published posts sort by publication date, drafts by last edit.
    pub async fn list(&self, filter: &PostFilter) -> DatabaseResult<Page<Post>> {
        let (limit, offset) = page_bounds(filter.limit, filter.offset);

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {POST_COLUMNS} FROM posts"));
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY COALESCE(published_at, updated_at) DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        let items = rows.iter().map(map_post).collect::<DatabaseResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total,
            limit,
            offset,
        })
    }

    pub async fn update(&self, id: i64, request: &UpdatePostRequest) -> DatabaseResult<Post> {
        let mut post = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("post {id}")))?;

        let update = request.clone();
        if let Some(title) = update.title {
            post.title = title;
        }
        if update.excerpt.is_some() {
            post.excerpt = update.excerpt;
        }
        if let Some(content) = update.content {
            post.content = content;
        }
        if update.cover_image_url.is_some() {
            post.cover_image_url = update.cover_image_url;
        }
        if let Some(tags) = update.tags {
            post.tags = tags;
        }
        post.updated_at = now_timestamp();

        sqlx::query(
            "UPDATE posts SET title = ?, excerpt = ?, content = ?, cover_image_url = ?, tags = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&post.title)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.cover_image_url)
        .bind(serde_json::to_string(&post.tags)?)
        .bind(&post.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(post)
    }

    /// Persist the publication fields of a post changed in memory.
    pub async fn save_publication(&self, post: &Post) -> DatabaseResult<()> {
        let result = sqlx::query("UPDATE posts SET status = ?, published_at = ?, updated_at = ? WHERE id = ?")
            .bind(post.status.as_str())
            .bind(&post.published_at)
            .bind(&post.updated_at)
            .bind(post.id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("post {}", post.id)));
        }
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> DatabaseResult<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("post {id}")));
        }
        Ok(())
    }

    pub async fn count_by_status(&self, status: PostStatus) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

//! Blog posts for the marketing site.

use realty_database::{
    now_timestamp, CreatePostRequest, DatabaseError, Page, Post, PostFilter, PostRepository,
    PostStatus, UpdatePostRequest,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{CatalogError, CatalogResult};
use crate::slug::{candidate, slugify};

const MAX_SLUG_ATTEMPTS: u32 = 100;
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// First paragraph of `content`, cut at a word boundary.
fn derive_excerpt(content: &str) -> Option<String> {
    let paragraph = content
        .split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty())?;
    let flat = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");

    if flat.chars().count() <= EXCERPT_CHARS {
        return Some(flat);
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    let trimmed = match cut.rfind(' ') {
        Some(space) => &cut[..space],
        None => cut.as_str(),
    };
    Some(format!("{trimmed}..."))
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[derive(Clone)]
pub struct PostService {
    posts: PostRepository,
}

impl PostService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            posts: PostRepository::new(pool),
        }
    }

    /// New posts always start as drafts.
    pub async fn create(&self, new: NewPost, author_id: Option<i64>) -> CatalogResult<Post> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::validation("title is required"));
        }
        if new.content.trim().is_empty() {
            return Err(CatalogError::validation("content is required"));
        }
        let base = slugify(new.slug.as_deref().unwrap_or(&title));
        if base.is_empty() {
            return Err(CatalogError::validation("title must contain letters or digits"));
        }

        let excerpt = new
            .excerpt
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .or_else(|| derive_excerpt(&new.content));

        let mut request = CreatePostRequest {
            title,
            slug: String::new(),
            excerpt,
            content: new.content,
            cover_image_url: new.cover_image_url,
            author_id,
            tags: normalize_tags(new.tags),
        };

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let slug = candidate(&base, attempt);
            if self.posts.slug_exists(&slug).await? {
                continue;
            }
            request.slug = slug;
            match self.posts.create(&request).await {
                Ok(post) => {
                    info!(post = %post.public_id, slug = %post.slug, "created draft post");
                    return Ok(post);
                }
                Err(DatabaseError::Duplicate(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(CatalogError::validation(format!("no free slug for '{base}'")))
    }

    pub async fn update(&self, public_id: &str, update: UpdatePostRequest) -> CatalogResult<Post> {
        let post = self.get(public_id).await?;
        if update.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(CatalogError::validation("title is required"));
        }
        if update.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(CatalogError::validation("content is required"));
        }
        let update = UpdatePostRequest {
            tags: update.tags.map(normalize_tags),
            ..update
        };
        Ok(self.posts.update(post.id, &update).await?)
    }

    pub async fn publish(&self, public_id: &str) -> CatalogResult<Post> {
        let mut post = self.get(public_id).await?;
        if post.is_published() {
            return Ok(post);
        }
        post.publish(&now_timestamp());
        self.posts.save_publication(&post).await?;
        info!(post = %post.public_id, "published post");
        Ok(post)
    }

    pub async fn unpublish(&self, public_id: &str) -> CatalogResult<Post> {
        let mut post = self.get(public_id).await?;
        if !post.is_published() {
            return Ok(post);
        }
        post.unpublish(&now_timestamp());
        self.posts.save_publication(&post).await?;
        info!(post = %post.public_id, "unpublished post");
        Ok(post)
    }

    pub async fn delete(&self, public_id: &str) -> CatalogResult<()> {
        let post = self.get(public_id).await?;
        self.posts.delete(post.id).await?;
        Ok(())
    }

    pub async fn get(&self, public_id: &str) -> CatalogResult<Post> {
        self.posts
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| CatalogError::not_found("post"))
    }

    /// Drafts are invisible to the public site.
    pub async fn get_published_by_slug(&self, slug: &str) -> CatalogResult<Post> {
        self.posts
            .find_by_slug(slug)
            .await?
            .filter(Post::is_published)
            .ok_or_else(|| CatalogError::not_found("post"))
    }

    pub async fn list_published(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
        tag: Option<String>,
    ) -> CatalogResult<Page<Post>> {
        let filter = PostFilter {
            status: Some(PostStatus::Published),
            tag,
            limit,
            offset,
        };
        Ok(self.posts.list(&filter).await?)
    }

    pub async fn list_all(&self, filter: PostFilter) -> CatalogResult<Page<Post>> {
        Ok(self.posts.list(&filter).await?)
    }

    pub async fn count_published(&self) -> CatalogResult<i64> {
        Ok(self.posts.count_by_status(PostStatus::Published).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_database;

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            slug: None,
            excerpt: None,
            content: "Spring is a busy season.\n\nMore listings come on the market.".to_string(),
            cover_image_url: None,
            tags: vec!["Market".to_string(), "market ".to_string(), " ".to_string()],
        }
    }

    #[test]
    fn excerpt_uses_first_paragraph() {
        assert_eq!(
            derive_excerpt("\n\nFirst  line\nstill first.\n\nSecond").as_deref(),
            Some("First line still first.")
        );
        let long = "word ".repeat(100);
        let excerpt = derive_excerpt(&long).unwrap();
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.chars().count() <= EXCERPT_CHARS + 3);
        assert_eq!(derive_excerpt("   "), None);
    }

    #[tokio::test]
    async fn create_starts_as_draft_with_clean_tags() {
        let (pool, _dir) = create_test_database().await;
        let service = PostService::new(pool);

        let post = service.create(new_post("Spring Market Update"), None).await.unwrap();
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.slug, "spring-market-update");
        assert_eq!(post.tags, vec!["market".to_string()]);
        assert_eq!(post.excerpt.as_deref(), Some("Spring is a busy season."));
        assert!(post.published_at.is_none());

        let again = service.create(new_post("Spring Market Update"), None).await.unwrap();
        assert_eq!(again.slug, "spring-market-update-2");
    }

    #[tokio::test]
    async fn drafts_are_hidden_until_published() {
        let (pool, _dir) = create_test_database().await;
        let service = PostService::new(pool);

        let post = service.create(new_post("Buying Guide"), None).await.unwrap();
        assert!(matches!(
            service.get_published_by_slug(&post.slug).await,
            Err(CatalogError::NotFound(_))
        ));
        assert_eq!(service.list_published(None, None, None).await.unwrap().total, 0);

        let published = service.publish(&post.public_id).await.unwrap();
        let first_published_at = published.published_at.clone();
        assert!(first_published_at.is_some());
        assert_eq!(service.get_published_by_slug(&post.slug).await.unwrap().id, post.id);
        assert_eq!(service.count_published().await.unwrap(), 1);

        let tagged = service
            .list_published(None, None, Some("market".to_string()))
            .await
            .unwrap();
        assert_eq!(tagged.total, 1);

        service.unpublish(&post.public_id).await.unwrap();
        assert_eq!(service.list_published(None, None, None).await.unwrap().total, 0);

        let republished = service.publish(&post.public_id).await.unwrap();
        assert_eq!(republished.published_at, first_published_at);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let (pool, _dir) = create_test_database().await;
        let service = PostService::new(pool);

        let post = service.create(new_post("Selling Tips"), None).await.unwrap();
        let blank = UpdatePostRequest {
            title: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(&post.public_id, blank).await,
            Err(CatalogError::Validation(_))
        ));

        let updated = service
            .update(
                &post.public_id,
                UpdatePostRequest {
                    title: Some("Selling Tips for 2026".to_string()),
                    tags: Some(vec!["Selling".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Selling Tips for 2026");
        assert_eq!(updated.tags, vec!["selling".to_string()]);

        service.delete(&post.public_id).await.unwrap();
        assert_eq!(service.list_all(PostFilter::default()).await.unwrap().total, 0);
    }
}

//! Blog post entity definitions

use serde::{Deserialize, Serialize};

text_enum! {
    PostStatus {
        Draft => "draft",
        Published => "published",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub public_id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image_url: Option<String>,
    pub author_id: Option<i64>,
    pub status: PostStatus,
    pub tags: Vec<String>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    /// Mark the post published. The first publication date is kept on republish.
    pub fn publish(&mut self, now: &str) {
        self.status = PostStatus::Published;
        if self.published_at.is_none() {
            self.published_at = Some(now.to_string());
        }
        self.updated_at = now.to_string();
    }

    pub fn unpublish(&mut self, now: &str) {
        self.status = PostStatus::Draft;
        self.updated_at = now.to_string();
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image_url: Option<String>,
    pub author_id: Option<i64>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

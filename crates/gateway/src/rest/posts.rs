//! Blog post endpoints, public and dashboard

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use realty_catalog::NewPost;
use realty_database::{Page, Post, PostFilter, PostStatus, UpdatePostRequest};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::GatewayResult;
use crate::middleware::CurrentUser;
use crate::rest::ActionResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image_url: Option<String>,
    /// Public id of the author. Only shown on the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    /// draft or published
    pub status: String,
    pub tags: Vec<String>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PostResponse {
    fn new(post: Post, author_id: Option<String>) -> Self {
        Self {
            id: post.public_id,
            title: post.title,
            slug: post.slug,
            excerpt: post.excerpt,
            content: post.content,
            cover_image_url: post.cover_image_url,
            author_id,
            status: post.status.to_string(),
            tags: post.tags,
            published_at: post.published_at,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }

    fn public(post: Post) -> Self {
        Self::new(post, None)
    }

    fn with_directory(post: Post, directory: &HashMap<i64, String>) -> Self {
        let author = post.author_id.and_then(|id| directory.get(&id).cloned());
        Self::new(post, author)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostListResponse {
    pub items: Vec<PostResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl PostListResponse {
    fn from_page(page: Page<Post>, convert: impl FnMut(Post) -> PostResponse) -> Self {
        let page = page.map(convert);
        Self {
            items: page.items,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PostQuery {
    pub tag: Option<String>,
    /// Dashboard only: draft or published.
    #[param(value_type = Option<String>)]
    pub status: Option<PostStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostBody {
    pub title: String,
    pub slug: Option<String>,
    /// Derived from the first paragraph when absent.
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePostBody {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub cover_image_url: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub fn create_public_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/posts", get(list_published_posts))
        .route("/api/posts/:slug", get(get_published_post))
}

pub fn create_dashboard_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/api/dashboard/posts", get(list_posts).post(create_post))
        .route(
            "/api/dashboard/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/dashboard/posts/:id/publish", post(publish_post))
        .route("/api/dashboard/posts/:id/unpublish", post(unpublish_post))
}

#[utoipa::path(
    get,
    path = "/api/posts",
    tag = "Posts",
    params(PostQuery),
    responses(
        (status = 200, description = "Published posts, newest first", body = PostListResponse)
    )
)]
pub async fn list_published_posts(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<PostQuery>,
) -> GatewayResult<Json<PostListResponse>> {
    let page = state
        .posts
        .list_published(query.limit, query.offset, query.tag)
        .await?;
    Ok(Json(PostListResponse::from_page(page, PostResponse::public)))
}

#[utoipa::path(
    get,
    path = "/api/posts/{slug}",
    tag = "Posts",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "A published post", body = PostResponse),
        (status = 404, description = "No such published post", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_published_post(
    State(state): State<Arc<GatewayState>>,
    Path(slug): Path<String>,
) -> GatewayResult<Json<PostResponse>> {
    let post = state.posts.get_published_by_slug(&slug).await?;
    Ok(Json(PostResponse::public(post)))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/posts",
    tag = "Dashboard Posts",
    security(("bearerAuth" = [])),
    params(PostQuery),
    responses(
        (status = 200, description = "Drafts and published posts", body = PostListResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_posts(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<PostQuery>,
) -> GatewayResult<Json<PostListResponse>> {
    current.require_post_access()?;

    let page = state
        .posts
        .list_all(PostFilter {
            status: query.status,
            tag: query.tag,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;
    let directory = state.user_directory().await?;
    Ok(Json(PostListResponse::from_page(page, |p| {
        PostResponse::with_directory(p, &directory)
    })))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/posts",
    tag = "Dashboard Posts",
    security(("bearerAuth" = [])),
    request_body = CreatePostBody,
    responses(
        (status = 200, description = "Draft created", body = PostResponse),
        (status = 400, description = "Invalid post", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_post(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreatePostBody>,
) -> GatewayResult<Json<PostResponse>> {
    let author = current.require_post_access()?;

    let post = state
        .posts
        .create(
            NewPost {
                title: req.title,
                slug: req.slug,
                excerpt: req.excerpt,
                content: req.content,
                cover_image_url: req.cover_image_url,
                tags: req.tags,
            },
            Some(author.id),
        )
        .await?;

    Ok(Json(PostResponse::new(post, Some(author.public_id.clone()))))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/posts/{id}",
    tag = "Dashboard Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post public ID")),
    responses(
        (status = 200, description = "The post", body = PostResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_post(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<PostResponse>> {
    current.require_post_access()?;

    let post = state.posts.get(&id).await?;
    let directory = state.user_directory().await?;
    Ok(Json(PostResponse::with_directory(post, &directory)))
}

#[utoipa::path(
    put,
    path = "/api/dashboard/posts/{id}",
    tag = "Dashboard Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post public ID")),
    request_body = UpdatePostBody,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 400, description = "Invalid update", body = crate::error::ErrorResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_post(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePostBody>,
) -> GatewayResult<Json<PostResponse>> {
    current.require_post_access()?;

    let post = state
        .posts
        .update(
            &id,
            UpdatePostRequest {
                title: req.title,
                excerpt: req.excerpt,
                content: req.content,
                cover_image_url: req.cover_image_url,
                tags: req.tags,
            },
        )
        .await?;
    let directory = state.user_directory().await?;
    Ok(Json(PostResponse::with_directory(post, &directory)))
}

#[utoipa::path(
    delete,
    path = "/api/dashboard/posts/{id}",
    tag = "Dashboard Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post public ID")),
    responses(
        (status = 200, description = "Post deleted", body = ActionResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_post(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<ActionResponse>> {
    current.require_post_access()?;
    state.posts.delete(&id).await?;
    Ok(Json(ActionResponse::ok()))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/posts/{id}/publish",
    tag = "Dashboard Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post public ID")),
    responses(
        (status = 200, description = "Post is published", body = PostResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn publish_post(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<PostResponse>> {
    current.require_post_access()?;

    let post = state.posts.publish(&id).await?;
    let directory = state.user_directory().await?;
    Ok(Json(PostResponse::with_directory(post, &directory)))
}

#[utoipa::path(
    post,
    path = "/api/dashboard/posts/{id}/unpublish",
    tag = "Dashboard Posts",
    security(("bearerAuth" = [])),
    params(("id" = String, Path, description = "Post public ID")),
    responses(
        (status = 200, description = "Post is back to draft", body = PostResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn unpublish_post(
    State(state): State<Arc<GatewayState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> GatewayResult<Json<PostResponse>> {
    current.require_post_access()?;

    let post = state.posts.unpublish(&id).await?;
    let directory = state.user_directory().await?;
    Ok(Json(PostResponse::with_directory(post, &directory)))
}

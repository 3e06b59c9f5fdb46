//! Admin API endpoints for the blog and user accounts
//!
//! Posts (staff):
//! - GET/POST /api/v1/admin/posts
//! - GET/PUT/DELETE /api/v1/admin/posts/{id}
//! - POST /api/v1/admin/posts/bulk - publish, unpublish, mark-reviewed, mark-unreviewed
//! - GET/POST /api/v1/admin/posts/{id}/audios
//! - PUT/DELETE /api/v1/admin/audios/{id}
//!
//! Users (superuser):
//! - GET /api/v1/admin/users
//! - PUT /api/v1/admin/users/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::auth::UserResponse;
use crate::api::common::{double_option, parse_bool_filter, PageQuery, PageResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    CreatePostAudioInput, CreatePostInput, ListParams, Post, PostAudio, PostFilter,
    UpdatePostAudioInput, UpdatePostInput, UpdateUserInput, UserRole,
};
use crate::services::{BulkAction, BulkResult};

/// Users per page in the admin list
const ADMIN_USERS_PER_PAGE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub is_published: Option<String>,
    pub reviewed: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub subtitle: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub image: Option<String>,
    pub audio_file: Option<String>,
    pub audio_duration: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed: bool,
    pub review_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub subtitle: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub image: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub audio_file: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub audio_duration: Option<Option<String>>,
    pub is_published: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub published_date: Option<Option<DateTime<Utc>>>,
    pub reviewed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub review_notes: Option<Option<String>>,
}

impl From<UpdatePostRequest> for UpdatePostInput {
    fn from(req: UpdatePostRequest) -> Self {
        Self {
            title: req.title,
            slug: req.slug,
            subtitle: req.subtitle,
            excerpt: req.excerpt,
            content: req.content,
            image: req.image,
            audio_file: req.audio_file,
            audio_duration: req.audio_duration,
            is_published: req.is_published,
            published_date: req.published_date,
            reviewed: req.reviewed,
            review_notes: req.review_notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AudioRequest {
    pub title: String,
    pub audio_file: String,
    pub duration: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub display_order: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAudioRequest {
    pub title: Option<String>,
    pub audio_file: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub duration: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub display_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub nickname: Option<Option<String>>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

/// Blog administration routes (staff)
pub fn posts_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/bulk", post(bulk_posts))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/audios", get(list_audios).post(create_audio))
        .route("/audios/{id}", put(update_audio).delete(delete_audio))
}

/// Account administration routes (superuser)
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{id}", put(update_user))
}

// ============================================================================
// Posts
// ============================================================================

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<PageResponse<Post>>, ApiError> {
    let filter = PostFilter {
        is_published: parse_bool_filter(query.is_published.as_deref()),
        reviewed: parse_bool_filter(query.reviewed.as_deref()),
        search: query.search,
    };
    let result = state
        .post_service
        .list_admin(&filter, query.page.as_deref())
        .await?;
    Ok(Json(result.into()))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get_by_id(id).await?))
}

async fn create_post(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let input = CreatePostInput {
        title: body.title,
        slug: body.slug,
        subtitle: body.subtitle,
        excerpt: body.excerpt,
        content: body.content,
        image: body.image,
        audio_file: body.audio_file,
        audio_duration: body.audio_duration,
        is_published: body.is_published,
        published_date: body.published_date,
        reviewed: body.reviewed,
        review_notes: body.review_notes,
        author_id: user.id,
    };
    let post = state.post_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.update(id, body.into()).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn bulk_posts(
    State(state): State<AppState>,
    Json(body): Json<BulkRequest>,
) -> Result<Json<BulkResult>, ApiError> {
    let result = state
        .post_service
        .bulk_action(body.action, &body.ids, Utc::now())
        .await?;
    tracing::info!("Bulk {:?}: {}", body.action, result.message);
    Ok(Json(result))
}

// ============================================================================
// Audio clips
// ============================================================================

async fn list_audios(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<PostAudio>>, ApiError> {
    Ok(Json(state.post_service.list_audios(post_id).await?))
}

async fn create_audio(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(body): Json<AudioRequest>,
) -> Result<(StatusCode, Json<PostAudio>), ApiError> {
    let audio = state
        .post_service
        .create_audio(CreatePostAudioInput {
            post_id,
            title: body.title,
            audio_file: body.audio_file,
            duration: body.duration,
            description: body.description,
            display_order: body.display_order,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(audio)))
}

async fn update_audio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateAudioRequest>,
) -> Result<Json<PostAudio>, ApiError> {
    let input = UpdatePostAudioInput {
        title: body.title,
        audio_file: body.audio_file,
        duration: body.duration,
        description: body.description,
        display_order: body.display_order,
    };
    Ok(Json(state.post_service.update_audio(id, input).await?))
}

async fn delete_audio(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete_audio(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Users
// ============================================================================

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<UserResponse>>, ApiError> {
    let params = ListParams::from_raw(query.page.as_deref(), ADMIN_USERS_PER_PAGE);
    let result = state.user_service.list(&params).await?;
    Ok(Json(result.map(UserResponse::from).into()))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(current)): Extension<AuthenticatedUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if id == current.id && (body.is_active == Some(false) || body.role.is_some_and(|r| r != UserRole::Superuser)) {
        return Err(ApiError::validation_error(
            "You cannot demote or deactivate your own account",
        ));
    }
    let input = UpdateUserInput {
        email: body.email,
        nickname: body.nickname,
        role: body.role,
        is_active: body.is_active,
    };
    Ok(Json(state.user_service.update(id, input).await?.into()))
}

//! Public blog endpoints
//!
//! - GET /api/v1/posts - Live posts, newest first
//! - GET /api/v1/posts/search?q= - Live posts whose title matches
//! - GET /api/v1/posts/{slug} - A live post with its audio clips

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::common::{PageQuery, PageResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::services::{PostDetail, PostView};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/search", get(search_posts))
        .route("/{slug}", get(get_post))
}

async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageResponse<PostView>>, ApiError> {
    let result = state
        .post_service
        .list_live(query.page.as_deref(), Utc::now())
        .await?;
    Ok(Json(result.into()))
}

async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<PageResponse<PostView>>, ApiError> {
    let result = state
        .post_service
        .search(query.q.as_deref(), query.page.as_deref(), Utc::now())
        .await?;
    Ok(Json(result.into()))
}

async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostDetail>, ApiError> {
    Ok(Json(state.post_service.get_live_by_slug(&slug, Utc::now()).await?))
}

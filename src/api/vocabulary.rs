//! Public temario endpoints
//!
//! - GET /api/v1/words?search=&category=&page= - Word list with categories
//! - GET /api/v1/words/{id} - A word with its categories
//! - GET /api/v1/categories - Thematic categories ordered by name

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::ThematicCategory;
use crate::services::{WordListing, WordView};

#[derive(Debug, Deserialize)]
pub struct WordsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub page: Option<String>,
}

pub fn words_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_words))
        .route("/{id}", get(get_word))
}

pub fn categories_router() -> Router<AppState> {
    Router::new().route("/", get(list_categories))
}

async fn list_words(
    State(state): State<AppState>,
    Query(query): Query<WordsQuery>,
) -> Result<Json<WordListing>, ApiError> {
    let listing = state
        .vocabulary_service
        .list_words(
            query.search.as_deref(),
            query.category.as_deref(),
            query.page.as_deref(),
        )
        .await?;
    Ok(Json(listing))
}

async fn get_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WordView>, ApiError> {
    Ok(Json(state.vocabulary_service.get_word(id).await?))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<ThematicCategory>>, ApiError> {
    Ok(Json(state.vocabulary_service.all_categories().await?))
}

//! Admin API endpoints for the temario (staff)
//!
//! - GET/POST /api/v1/admin/categories, GET/PUT/DELETE /api/v1/admin/categories/{id}
//! - GET/POST /api/v1/admin/words, GET/PUT/DELETE /api/v1/admin/words/{id}
//! - POST /api/v1/admin/words/duplicate
//! - GET/POST /api/v1/admin/examples (search, word, category), GET/PUT/DELETE /api/v1/admin/examples/{id}
//!
//! Word and example lists carry the computed preview fields (definition
//! preview, category badges, gender display, word with meaning).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{parse_bool_filter, parse_id_filter, IdsRequest, PageResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    CategoryInput, CategoryWithCount, ExampleSentence, ExampleSentenceFilter, ExampleSentenceInput,
    Gender, ThematicCategory, Word, WordFilter, WordInput,
};
use crate::services::vocabulary::{DuplicateResult, ExampleAdminRow, WordAdminRow};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WordListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub gender: Option<String>,
    pub has_gender: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WordRequest {
    pub text: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub has_gender: bool,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

impl From<WordRequest> for WordInput {
    fn from(req: WordRequest) -> Self {
        Self {
            text: req.text,
            definition: req.definition,
            gender: req.gender,
            has_gender: req.has_gender,
            category_ids: req.category_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExampleListQuery {
    pub search: Option<String>,
    pub word: Option<String>,
    pub category: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExampleRequest {
    pub word_id: i64,
    pub text: String,
    pub translation: Option<String>,
}

impl From<ExampleRequest> for ExampleSentenceInput {
    fn from(req: ExampleRequest) -> Self {
        Self {
            word_id: req.word_id,
            text: req.text,
            translation: req.translation,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/words", get(list_words).post(create_word))
        .route("/words/duplicate", post(duplicate_words))
        .route(
            "/words/{id}",
            get(get_word).put(update_word).delete(delete_word),
        )
        .route("/examples", get(list_examples).post(create_example))
        .route(
            "/examples/{id}",
            get(get_example).put(update_example).delete(delete_example),
        )
}

// ============================================================================
// Thematic categories
// ============================================================================

async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<CategoryWithCount>>, ApiError> {
    Ok(Json(
        state
            .vocabulary_service
            .list_categories(query.search.as_deref())
            .await?,
    ))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ThematicCategory>, ApiError> {
    Ok(Json(state.vocabulary_service.get_category(id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<ThematicCategory>), ApiError> {
    let category = state
        .vocabulary_service
        .create_category(CategoryInput {
            name: body.name,
            description: body.description,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CategoryRequest>,
) -> Result<Json<ThematicCategory>, ApiError> {
    let category = state
        .vocabulary_service
        .update_category(
            id,
            CategoryInput {
                name: body.name,
                description: body.description,
            },
        )
        .await?;
    Ok(Json(category))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.vocabulary_service.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Words
// ============================================================================

async fn list_words(
    State(state): State<AppState>,
    Query(query): Query<WordListQuery>,
) -> Result<Json<PageResponse<WordAdminRow>>, ApiError> {
    let filter = WordFilter {
        search: query.search,
        category_id: parse_id_filter(query.category.as_deref()),
        gender: query
            .gender
            .as_deref()
            .filter(|g| !g.is_empty())
            .and_then(|g| g.parse().ok()),
        has_gender: parse_bool_filter(query.has_gender.as_deref()),
    };
    let result = state
        .vocabulary_service
        .list_words_admin(&filter, query.page.as_deref())
        .await?;
    Ok(Json(result.into()))
}

async fn get_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Word>, ApiError> {
    Ok(Json(state.vocabulary_service.get_word(id).await?.word))
}

async fn create_word(
    State(state): State<AppState>,
    Json(body): Json<WordRequest>,
) -> Result<(StatusCode, Json<Word>), ApiError> {
    let word = state.vocabulary_service.create_word(body.into()).await?;
    Ok((StatusCode::CREATED, Json(word)))
}

async fn update_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<WordRequest>,
) -> Result<Json<Word>, ApiError> {
    Ok(Json(state.vocabulary_service.update_word(id, body.into()).await?))
}

async fn delete_word(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.vocabulary_service.delete_word(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn duplicate_words(
    State(state): State<AppState>,
    Json(body): Json<IdsRequest>,
) -> Result<Json<DuplicateResult>, ApiError> {
    Ok(Json(state.vocabulary_service.duplicate_words(&body.ids).await?))
}

// ============================================================================
// Example sentences
// ============================================================================

async fn list_examples(
    State(state): State<AppState>,
    Query(query): Query<ExampleListQuery>,
) -> Result<Json<PageResponse<ExampleAdminRow>>, ApiError> {
    let filter = ExampleSentenceFilter {
        search: query.search,
        word_id: parse_id_filter(query.word.as_deref()),
        category_id: parse_id_filter(query.category.as_deref()),
    };
    let result = state
        .vocabulary_service
        .list_examples_admin(&filter, query.page.as_deref())
        .await?;
    Ok(Json(result.into()))
}

async fn get_example(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ExampleSentence>, ApiError> {
    Ok(Json(state.vocabulary_service.get_example(id).await?))
}

async fn create_example(
    State(state): State<AppState>,
    Json(body): Json<ExampleRequest>,
) -> Result<(StatusCode, Json<ExampleSentence>), ApiError> {
    let example = state.vocabulary_service.create_example(body.into()).await?;
    Ok((StatusCode::CREATED, Json(example)))
}

async fn update_example(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ExampleRequest>,
) -> Result<Json<ExampleSentence>, ApiError> {
    Ok(Json(
        state
            .vocabulary_service
            .update_example(id, body.into())
            .await?,
    ))
}

async fn delete_example(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.vocabulary_service.delete_example(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Admin API endpoints for graded readers (staff)
//!
//! - GET/POST /api/v1/admin/levels, GET/PUT/DELETE /api/v1/admin/levels/{id}
//! - GET/POST /api/v1/admin/readers, GET/PUT/DELETE /api/v1/admin/readers/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::common::{parse_id_filter, PageResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{DifficultyLevel, DifficultyLevelInput, Reader, ReaderFilter, ReaderInput};

#[derive(Debug, Deserialize)]
pub struct LevelListQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LevelRequest {
    pub name: String,
    pub level_number: i64,
    #[serde(default)]
    pub description: String,
}

impl From<LevelRequest> for DifficultyLevelInput {
    fn from(req: LevelRequest) -> Self {
        Self {
            name: req.name,
            level_number: req.level_number,
            description: req.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReaderListQuery {
    pub search: Option<String>,
    pub level: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReaderRequest {
    pub title: String,
    pub author: String,
    pub difficulty_level_id: i64,
    #[serde(default)]
    pub description: String,
    pub content: String,
    pub publication_date: NaiveDate,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub word_count: i64,
    #[serde(default)]
    pub vocabulary_focus: String,
    #[serde(default)]
    pub grammar_focus: String,
}

impl From<ReaderRequest> for ReaderInput {
    fn from(req: ReaderRequest) -> Self {
        Self {
            title: req.title,
            author: req.author,
            difficulty_level_id: req.difficulty_level_id,
            description: req.description,
            content: req.content,
            publication_date: req.publication_date,
            cover_image: req.cover_image,
            word_count: req.word_count,
            vocabulary_focus: req.vocabulary_focus,
            grammar_focus: req.grammar_focus,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/levels", get(list_levels).post(create_level))
        .route(
            "/levels/{id}",
            get(get_level).put(update_level).delete(delete_level),
        )
        .route("/readers", get(list_readers).post(create_reader))
        .route(
            "/readers/{id}",
            get(get_reader).put(update_reader).delete(delete_reader),
        )
}

async fn list_levels(
    State(state): State<AppState>,
    Query(query): Query<LevelListQuery>,
) -> Result<Json<Vec<DifficultyLevel>>, ApiError> {
    Ok(Json(
        state
            .reader_service
            .list_levels(query.search.as_deref())
            .await?,
    ))
}

async fn get_level(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DifficultyLevel>, ApiError> {
    Ok(Json(state.reader_service.get_level(id).await?))
}

async fn create_level(
    State(state): State<AppState>,
    Json(body): Json<LevelRequest>,
) -> Result<(StatusCode, Json<DifficultyLevel>), ApiError> {
    let level = state.reader_service.create_level(body.into()).await?;
    Ok((StatusCode::CREATED, Json(level)))
}

async fn update_level(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<LevelRequest>,
) -> Result<Json<DifficultyLevel>, ApiError> {
    Ok(Json(state.reader_service.update_level(id, body.into()).await?))
}

async fn delete_level(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.reader_service.delete_level(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_readers(
    State(state): State<AppState>,
    Query(query): Query<ReaderListQuery>,
) -> Result<Json<PageResponse<Reader>>, ApiError> {
    let filter = ReaderFilter {
        search: query.search,
        difficulty_level_id: parse_id_filter(query.level.as_deref()),
        ..Default::default()
    };
    let result = state
        .reader_service
        .list_admin(&filter, query.page.as_deref())
        .await?;
    Ok(Json(result.into()))
}

async fn get_reader(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Reader>, ApiError> {
    Ok(Json(state.reader_service.get(id).await?))
}

async fn create_reader(
    State(state): State<AppState>,
    Json(body): Json<ReaderRequest>,
) -> Result<(StatusCode, Json<Reader>), ApiError> {
    let reader = state.reader_service.create(body.into()).await?;
    Ok((StatusCode::CREATED, Json(reader)))
}

async fn update_reader(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ReaderRequest>,
) -> Result<Json<Reader>, ApiError> {
    Ok(Json(state.reader_service.update(id, body.into()).await?))
}

async fn delete_reader(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.reader_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Public graded reader endpoints
//!
//! - GET /api/v1/readers?search=&level=&page= - Published readers by level
//! - GET /api/v1/readers/{id} - A reader with related readers of its level

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::services::{ReaderDetail, ReaderListing};

#[derive(Debug, Deserialize)]
pub struct ReadersQuery {
    pub search: Option<String>,
    pub level: Option<String>,
    pub page: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_readers))
        .route("/{id}", get(get_reader))
}

async fn list_readers(
    State(state): State<AppState>,
    Query(query): Query<ReadersQuery>,
) -> Result<Json<ReaderListing>, ApiError> {
    let listing = state
        .reader_service
        .list_public(
            query.search.as_deref(),
            query.level.as_deref(),
            query.page.as_deref(),
            Utc::now().date_naive(),
        )
        .await?;
    Ok(Json(listing))
}

async fn get_reader(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ReaderDetail>, ApiError> {
    let detail = state
        .reader_service
        .get_public(id, Utc::now().date_naive())
        .await?;
    Ok(Json(detail))
}

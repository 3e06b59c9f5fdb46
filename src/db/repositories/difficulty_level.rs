//! Difficulty level repository
//!
//! Deleting a level deletes its readers (cascade).

use super::{like_pattern, search_term};
use crate::db::DynDatabasePool;
use crate::models::{DifficultyLevel, DifficultyLevelInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::sync::Arc;

#[async_trait]
pub trait DifficultyLevelRepository: Send + Sync {
    async fn create(&self, input: &DifficultyLevelInput) -> Result<DifficultyLevel>;

    async fn get_by_id(&self, id: i64) -> Result<Option<DifficultyLevel>>;

    async fn get_by_level_number(&self, level_number: i64) -> Result<Option<DifficultyLevel>>;

    /// Levels ordered by level number; `search` matches the name
    async fn list(&self, search: Option<&str>) -> Result<Vec<DifficultyLevel>>;

    async fn update(&self, id: i64, input: &DifficultyLevelInput) -> Result<Option<DifficultyLevel>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxDifficultyLevelRepository {
    pool: DynDatabasePool,
}

impl SqlxDifficultyLevelRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DifficultyLevelRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DifficultyLevelRepository for SqlxDifficultyLevelRepository {
    async fn create(&self, input: &DifficultyLevelInput) -> Result<DifficultyLevel> {
        let result = sqlx::query(
            "INSERT INTO difficulty_levels (name, level_number, description) VALUES (?, ?, ?)",
        )
        .bind(&input.name)
        .bind(input.level_number)
        .bind(&input.description)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create difficulty level")?;

        Ok(DifficultyLevel {
            id: result.last_insert_rowid(),
            name: input.name.clone(),
            level_number: input.level_number,
            description: input.description.clone(),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<DifficultyLevel>> {
        let row = sqlx::query(
            "SELECT id, name, level_number, description FROM difficulty_levels WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get difficulty level")?;
        row.as_ref().map(row_to_level_sqlite).transpose()
    }

    async fn get_by_level_number(&self, level_number: i64) -> Result<Option<DifficultyLevel>> {
        let row = sqlx::query(
            "SELECT id, name, level_number, description FROM difficulty_levels WHERE level_number = ?",
        )
        .bind(level_number)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get difficulty level by number")?;
        row.as_ref().map(row_to_level_sqlite).transpose()
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<DifficultyLevel>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, name, level_number, description FROM difficulty_levels",
        );
        if let Some(term) = search_term(search) {
            qb.push(" WHERE name LIKE ");
            qb.push_bind(like_pattern(term));
            qb.push(" ESCAPE '\\'");
        }
        qb.push(" ORDER BY level_number ASC");

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list difficulty levels")?;
        rows.iter().map(row_to_level_sqlite).collect()
    }

    async fn update(&self, id: i64, input: &DifficultyLevelInput) -> Result<Option<DifficultyLevel>> {
        let result = sqlx::query(
            "UPDATE difficulty_levels SET name = ?, level_number = ?, description = ? WHERE id = ?",
        )
        .bind(&input.name)
        .bind(input.level_number)
        .bind(&input.description)
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update difficulty level")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM difficulty_levels WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete difficulty level")?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_level_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<DifficultyLevel> {
    Ok(DifficultyLevel {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        level_number: row.try_get("level_number")?,
        description: row.try_get("description")?,
    })
}

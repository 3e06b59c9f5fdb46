//! Thematic category repository
//!
//! Deleting a category removes its word links (cascade) but never the words.

use super::{like_pattern, search_term};
use crate::db::DynDatabasePool;
use crate::models::{CategoryWithCount, ThematicCategory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::sync::Arc;

#[async_trait]
pub trait ThematicCategoryRepository: Send + Sync {
    async fn create(&self, name: &str, description: Option<&str>) -> Result<ThematicCategory>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ThematicCategory>>;

    /// Name lookup, ignoring ASCII case
    async fn get_by_name(&self, name: &str) -> Result<Option<ThematicCategory>>;

    /// All categories ordered by name
    async fn list_all(&self) -> Result<Vec<ThematicCategory>>;

    /// Categories with their word counts, ordered by name. `search` matches
    /// name or description.
    async fn list_with_counts(&self, search: Option<&str>) -> Result<Vec<CategoryWithCount>>;

    /// Categories linked to a word, ordered by name
    async fn list_for_word(&self, word_id: i64) -> Result<Vec<ThematicCategory>>;

    async fn update(&self, category: &ThematicCategory) -> Result<ThematicCategory>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxThematicCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxThematicCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ThematicCategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ThematicCategoryRepository for SqlxThematicCategoryRepository {
    async fn create(&self, name: &str, description: Option<&str>) -> Result<ThematicCategory> {
        let result = sqlx::query("INSERT INTO thematic_categories (name, description) VALUES (?, ?)")
            .bind(name)
            .bind(description)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to create thematic category")?;

        Ok(ThematicCategory {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ThematicCategory>> {
        let row = sqlx::query("SELECT id, name, description FROM thematic_categories WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get thematic category")?;
        row.as_ref().map(row_to_category_sqlite).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<ThematicCategory>> {
        let row = sqlx::query(
            "SELECT id, name, description FROM thematic_categories WHERE name = ? COLLATE NOCASE",
        )
        .bind(name)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get thematic category by name")?;
        row.as_ref().map(row_to_category_sqlite).transpose()
    }

    async fn list_all(&self) -> Result<Vec<ThematicCategory>> {
        let rows = sqlx::query("SELECT id, name, description FROM thematic_categories ORDER BY name ASC")
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list thematic categories")?;
        rows.iter().map(row_to_category_sqlite).collect()
    }

    async fn list_with_counts(&self, search: Option<&str>) -> Result<Vec<CategoryWithCount>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT c.id, c.name, c.description, COUNT(wc.word_id) AS word_count
            FROM thematic_categories c
            LEFT JOIN word_thematic_categories wc ON wc.category_id = c.id
            "#,
        );
        if let Some(term) = search_term(search) {
            let pattern = like_pattern(term);
            qb.push(" WHERE c.name LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR c.description LIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\'");
        }
        qb.push(" GROUP BY c.id, c.name, c.description ORDER BY c.name ASC");

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list thematic categories with counts")?;

        rows.iter()
            .map(|row| {
                Ok(CategoryWithCount {
                    category: row_to_category_sqlite(row)?,
                    word_count: row.try_get("word_count")?,
                })
            })
            .collect()
    }

    async fn list_for_word(&self, word_id: i64) -> Result<Vec<ThematicCategory>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.name, c.description
            FROM thematic_categories c
            INNER JOIN word_thematic_categories wc ON wc.category_id = c.id
            WHERE wc.word_id = ?
            ORDER BY c.name ASC
            "#,
        )
        .bind(word_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list categories for word")?;
        rows.iter().map(row_to_category_sqlite).collect()
    }

    async fn update(&self, category: &ThematicCategory) -> Result<ThematicCategory> {
        sqlx::query("UPDATE thematic_categories SET name = ?, description = ? WHERE id = ?")
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update thematic category")?;
        Ok(category.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM thematic_categories WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete thematic category")?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ThematicCategory> {
    Ok(ThematicCategory {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
    })
}

//! Word repository
//!
//! Words and their category links are written together in one transaction.
//! Deleting a word cascades to its example sentences and category links.
//! Gender normalization is applied on every save.

use super::{like_pattern, search_term};
use crate::db::DynDatabasePool;
use crate::models::{Gender, ListParams, Word, WordFilter, WordInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use std::sync::Arc;

#[async_trait]
pub trait WordRepository: Send + Sync {
    /// Insert a word with its category links; timestamps set to now
    async fn create(&self, input: &WordInput) -> Result<Word>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Word>>;

    /// Replace a word's fields and category links; bumps `updated_at`
    async fn update(&self, id: i64, input: &WordInput) -> Result<Option<Word>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Words ordered by text
    async fn list(&self, filter: &WordFilter, params: &ListParams) -> Result<Vec<Word>>;

    async fn count(&self, filter: &WordFilter) -> Result<i64>;

    /// Words by id, in text order; unknown ids are ignored
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Word>>;
}

pub struct SqlxWordRepository {
    pool: DynDatabasePool,
}

impl SqlxWordRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn WordRepository> {
        Arc::new(Self::new(pool))
    }
}

const WORD_SELECT: &str = r#"
    SELECT w.id, w.text, w.definition, w.gender, w.has_gender, w.created_at, w.updated_at,
           (SELECT GROUP_CONCAT(wc.category_id) FROM word_thematic_categories wc
            WHERE wc.word_id = w.id) AS category_ids
    FROM words w
"#;

#[async_trait]
impl WordRepository for SqlxWordRepository {
    async fn create(&self, input: &WordInput) -> Result<Word> {
        let input = input.clone().normalized();
        let now = Utc::now();
        let mut tx = self.pool.sqlite().begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO words (text, definition, gender, has_gender, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.text)
        .bind(&input.definition)
        .bind(input.gender.code())
        .bind(input.has_gender)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create word")?;

        let id = result.last_insert_rowid();
        replace_links(&mut *tx, id, &input.category_ids).await?;
        tx.commit().await?;

        Ok(Word {
            id,
            text: input.text,
            definition: input.definition,
            gender: input.gender,
            has_gender: input.has_gender,
            category_ids: sorted_ids(&input.category_ids),
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Word>> {
        let sql = format!("{} WHERE w.id = ?", WORD_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get word")?;
        row.as_ref().map(row_to_word_sqlite).transpose()
    }

    async fn update(&self, id: i64, input: &WordInput) -> Result<Option<Word>> {
        let input = input.clone().normalized();
        let now = Utc::now();
        let mut tx = self.pool.sqlite().begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE words
            SET text = ?, definition = ?, gender = ?, has_gender = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.text)
        .bind(&input.definition)
        .bind(input.gender.code())
        .bind(input.has_gender)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update word")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        replace_links(&mut *tx, id, &input.category_ids).await?;
        tx.commit().await?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM words WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete word")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &WordFilter, params: &ListParams) -> Result<Vec<Word>> {
        let mut qb = QueryBuilder::<Sqlite>::new(WORD_SELECT);
        push_word_filter(&mut qb, filter);
        qb.push(" ORDER BY w.text ASC, w.id ASC LIMIT ");
        qb.push_bind(params.limit());
        qb.push(" OFFSET ");
        qb.push_bind(params.offset());

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list words")?;
        rows.iter().map(row_to_word_sqlite).collect()
    }

    async fn count(&self, filter: &WordFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM words w");
        push_word_filter(&mut qb, filter);
        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count words")?;
        Ok(count)
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Word>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(WORD_SELECT);
        qb.push(" WHERE w.id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY w.text ASC, w.id ASC");

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to load words")?;
        rows.iter().map(row_to_word_sqlite).collect()
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn push_word_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &WordFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(term) = search_term(filter.search.as_deref()) {
        let pattern = like_pattern(term);
        qb.push(" AND (w.text LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR w.definition LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND w.id IN (SELECT word_id FROM word_thematic_categories WHERE category_id = ");
        qb.push_bind(category_id);
        qb.push(")");
    }
    if let Some(gender) = filter.gender {
        qb.push(" AND w.gender = ");
        qb.push_bind(gender.code());
    }
    if let Some(has_gender) = filter.has_gender {
        qb.push(" AND w.has_gender = ");
        qb.push_bind(has_gender);
    }
}

async fn replace_links(conn: &mut SqliteConnection, word_id: i64, category_ids: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM word_thematic_categories WHERE word_id = ?")
        .bind(word_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear word categories")?;

    for category_id in sorted_ids(category_ids) {
        sqlx::query("INSERT INTO word_thematic_categories (word_id, category_id) VALUES (?, ?)")
            .bind(word_id)
            .bind(category_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to link word {} to category {}", word_id, category_id))?;
    }
    Ok(())
}

fn sorted_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn row_to_word_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Word> {
    let gender_code: String = row.try_get("gender")?;
    let gender = Gender::from_code(&gender_code)
        .with_context(|| format!("Invalid gender in database: {}", gender_code))?;

    let category_ids: Option<String> = row.try_get("category_ids")?;
    let category_ids = category_ids
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid category link in database")?;

    Ok(Word {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        definition: row.try_get("definition")?,
        gender,
        has_gender: row.try_get("has_gender")?,
        category_ids: sorted_ids(&category_ids),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

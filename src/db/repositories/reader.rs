//! Reader repository
//!
//! Readers are always listed in `(level_number, title)` order.

use super::{like_pattern, search_term};
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Reader, ReaderFilter, ReaderInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::sync::Arc;

#[async_trait]
pub trait ReaderRepository: Send + Sync {
    async fn create(&self, input: &ReaderInput) -> Result<Reader>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Reader>>;

    async fn update(&self, id: i64, input: &ReaderInput) -> Result<Option<Reader>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn list(&self, filter: &ReaderFilter, params: &ListParams) -> Result<Vec<Reader>>;

    async fn count(&self, filter: &ReaderFilter) -> Result<i64>;

    /// Other readers of the same level, excluding `reader`
    async fn related(
        &self,
        reader: &Reader,
        published_on_or_before: Option<NaiveDate>,
        limit: i64,
    ) -> Result<Vec<Reader>>;
}

pub struct SqlxReaderRepository {
    pool: DynDatabasePool,
}

impl SqlxReaderRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReaderRepository> {
        Arc::new(Self::new(pool))
    }
}

const READER_SELECT: &str = r#"
    SELECT r.id, r.title, r.author, r.difficulty_level_id, d.level_number, d.name AS level_name,
           r.description, r.content, r.publication_date, r.cover_image, r.word_count,
           r.vocabulary_focus, r.grammar_focus
    FROM readers r
    INNER JOIN difficulty_levels d ON d.id = r.difficulty_level_id
"#;

const READER_ORDER: &str = " ORDER BY d.level_number ASC, r.title ASC, r.id ASC";

#[async_trait]
impl ReaderRepository for SqlxReaderRepository {
    async fn create(&self, input: &ReaderInput) -> Result<Reader> {
        let result = sqlx::query(
            r#"
            INSERT INTO readers (title, author, difficulty_level_id, description, content,
                                 publication_date, cover_image, word_count, vocabulary_focus, grammar_focus)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.title)
        .bind(&input.author)
        .bind(input.difficulty_level_id)
        .bind(&input.description)
        .bind(&input.content)
        .bind(input.publication_date)
        .bind(&input.cover_image)
        .bind(input.word_count)
        .bind(&input.vocabulary_focus)
        .bind(&input.grammar_focus)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create reader")?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Reader {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Reader>> {
        let sql = format!("{} WHERE r.id = ?", READER_SELECT);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get reader")?;
        row.as_ref().map(row_to_reader_sqlite).transpose()
    }

    async fn update(&self, id: i64, input: &ReaderInput) -> Result<Option<Reader>> {
        let result = sqlx::query(
            r#"
            UPDATE readers
            SET title = ?, author = ?, difficulty_level_id = ?, description = ?, content = ?,
                publication_date = ?, cover_image = ?, word_count = ?, vocabulary_focus = ?,
                grammar_focus = ?
            WHERE id = ?
            "#,
        )
        .bind(&input.title)
        .bind(&input.author)
        .bind(input.difficulty_level_id)
        .bind(&input.description)
        .bind(&input.content)
        .bind(input.publication_date)
        .bind(&input.cover_image)
        .bind(input.word_count)
        .bind(&input.vocabulary_focus)
        .bind(&input.grammar_focus)
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update reader")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM readers WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete reader")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &ReaderFilter, params: &ListParams) -> Result<Vec<Reader>> {
        let mut qb = QueryBuilder::<Sqlite>::new(READER_SELECT);
        push_reader_filter(&mut qb, filter);
        qb.push(READER_ORDER);
        qb.push(" LIMIT ");
        qb.push_bind(params.limit());
        qb.push(" OFFSET ");
        qb.push_bind(params.offset());

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list readers")?;
        rows.iter().map(row_to_reader_sqlite).collect()
    }

    async fn count(&self, filter: &ReaderFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM readers r INNER JOIN difficulty_levels d ON d.id = r.difficulty_level_id",
        );
        push_reader_filter(&mut qb, filter);
        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count readers")?;
        Ok(count)
    }

    async fn related(
        &self,
        reader: &Reader,
        published_on_or_before: Option<NaiveDate>,
        limit: i64,
    ) -> Result<Vec<Reader>> {
        let mut qb = QueryBuilder::<Sqlite>::new(READER_SELECT);
        qb.push(" WHERE r.difficulty_level_id = ");
        qb.push_bind(reader.difficulty_level_id);
        qb.push(" AND r.id != ");
        qb.push_bind(reader.id);
        if let Some(day) = published_on_or_before {
            qb.push(" AND r.publication_date <= ");
            qb.push_bind(day);
        }
        qb.push(READER_ORDER);
        qb.push(" LIMIT ");
        qb.push_bind(limit);

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list related readers")?;
        rows.iter().map(row_to_reader_sqlite).collect()
    }
}

fn push_reader_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ReaderFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(term) = search_term(filter.search.as_deref()) {
        let pattern = like_pattern(term);
        qb.push(" AND (");
        let columns = [
            "r.title",
            "r.author",
            "r.description",
            "r.content",
            "r.vocabulary_focus",
            "r.grammar_focus",
        ];
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column);
            qb.push(" LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\'");
        }
        qb.push(")");
    }
    if let Some(level_number) = filter.level_number {
        qb.push(" AND d.level_number = ");
        qb.push_bind(level_number);
    }
    if let Some(level_id) = filter.difficulty_level_id {
        qb.push(" AND r.difficulty_level_id = ");
        qb.push_bind(level_id);
    }
    if let Some(day) = filter.published_on_or_before {
        qb.push(" AND r.publication_date <= ");
        qb.push_bind(day);
    }
}

fn row_to_reader_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Reader> {
    Ok(Reader {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author: row.try_get("author")?,
        difficulty_level_id: row.try_get("difficulty_level_id")?,
        level_number: row.try_get("level_number")?,
        level_name: row.try_get("level_name")?,
        description: row.try_get("description")?,
        content: row.try_get("content")?,
        publication_date: row.try_get("publication_date")?,
        cover_image: row.try_get("cover_image")?,
        word_count: row.try_get("word_count")?,
        vocabulary_focus: row.try_get("vocabulary_focus")?,
        grammar_focus: row.try_get("grammar_focus")?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::{DifficultyLevelRepository, SqlxDifficultyLevelRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::DifficultyLevelInput;

    pub(crate) fn reader_input(title: &str, level_id: i64, date: NaiveDate) -> ReaderInput {
        ReaderInput {
            title: title.to_string(),
            author: "Ana Autora".to_string(),
            difficulty_level_id: level_id,
            description: format!("Resumen de {}", title),
            content: "Había una vez...".to_string(),
            publication_date: date,
            cover_image: None,
            word_count: 500,
            vocabulary_focus: "familia".to_string(),
            grammar_focus: "pretérito".to_string(),
        }
    }

    pub(crate) fn level(name: &str, number: i64) -> DifficultyLevelInput {
        DifficultyLevelInput {
            name: name.to_string(),
            level_number: number,
            description: String::new(),
        }
    }

    async fn setup() -> (SqlxDifficultyLevelRepository, SqlxReaderRepository) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        (
            SqlxDifficultyLevelRepository::new(pool.clone()),
            SqlxReaderRepository::new(pool),
        )
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_readers_ordered_by_level_then_title() {
        let (levels, readers) = setup().await;
        let advanced = levels.create(&level("Advanced", 3)).await.unwrap();
        let beginner = levels.create(&level("Beginner", 1)).await.unwrap();

        readers.create(&reader_input("Zorro", beginner.id, day(2024, 1, 1))).await.unwrap();
        readers.create(&reader_input("Abeja", advanced.id, day(2024, 1, 1))).await.unwrap();
        readers.create(&reader_input("Gato", beginner.id, day(2024, 1, 1))).await.unwrap();

        let titles: Vec<String> = readers
            .list(&ReaderFilter::default(), &ListParams::new(1, 9))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Gato", "Zorro", "Abeja"]);

        let names: Vec<String> = levels.list(None).await.unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["Beginner", "Advanced"]);
    }

    #[tokio::test]
    async fn test_filters() {
        let (levels, readers) = setup().await;
        let one = levels.create(&level("Beginner", 1)).await.unwrap();
        let two = levels.create(&level("Intermediate", 2)).await.unwrap();

        let mut input = reader_input("El viaje", two.id, day(2024, 5, 1));
        input.grammar_focus = "subjuntivo".to_string();
        readers.create(&input).await.unwrap();
        readers.create(&reader_input("La casa", one.id, day(2030, 1, 1))).await.unwrap();

        let by_grammar = ReaderFilter {
            search: Some("SUBJUNTIVO".to_string()),
            ..Default::default()
        };
        assert_eq!(readers.count(&by_grammar).await.unwrap(), 1);

        let by_level = ReaderFilter {
            level_number: Some(1),
            ..Default::default()
        };
        assert_eq!(readers.count(&by_level).await.unwrap(), 1);

        let published = ReaderFilter {
            published_on_or_before: Some(day(2025, 1, 1)),
            ..Default::default()
        };
        assert_eq!(readers.count(&published).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_related_same_level_excluding_self() {
        let (levels, readers) = setup().await;
        let one = levels.create(&level("Beginner", 1)).await.unwrap();
        let two = levels.create(&level("Intermediate", 2)).await.unwrap();

        let main = readers.create(&reader_input("Principal", one.id, day(2024, 1, 1))).await.unwrap();
        for title in ["A", "B", "C", "D", "E"] {
            readers.create(&reader_input(title, one.id, day(2024, 1, 1))).await.unwrap();
        }
        readers.create(&reader_input("Otro nivel", two.id, day(2024, 1, 1))).await.unwrap();

        let related = readers.related(&main, None, 4).await.unwrap();
        assert_eq!(related.len(), 4);
        assert!(related.iter().all(|r| r.id != main.id && r.difficulty_level_id == one.id));
    }

    #[tokio::test]
    async fn test_level_delete_cascades() {
        let (levels, readers) = setup().await;
        let one = levels.create(&level("Beginner", 1)).await.unwrap();
        let reader = readers.create(&reader_input("Uno", one.id, day(2024, 1, 1))).await.unwrap();
        assert_eq!(reader.level_name, "Beginner");

        levels.delete(one.id).await.unwrap();
        assert!(readers.get_by_id(reader.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_level_number_rejected() {
        let (levels, _readers) = setup().await;
        levels.create(&level("Beginner", 1)).await.unwrap();
        assert!(levels.create(&level("Otra", 1)).await.is_err());
    }
}

//! Example sentence repository
//!
//! Sentences belong to a word and are deleted with it (cascade).

use super::{like_pattern, search_term};
use crate::db::DynDatabasePool;
use crate::models::{ExampleSentence, ExampleSentenceFilter, ExampleSentenceInput, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ExampleSentenceRepository: Send + Sync {
    /// Insert a sentence; `created_at` is set to now
    async fn create(&self, input: &ExampleSentenceInput) -> Result<ExampleSentence>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ExampleSentence>>;

    async fn update(&self, id: i64, input: &ExampleSentenceInput) -> Result<Option<ExampleSentence>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Newest first
    async fn list(&self, filter: &ExampleSentenceFilter, params: &ListParams) -> Result<Vec<ExampleSentence>>;

    async fn count(&self, filter: &ExampleSentenceFilter) -> Result<i64>;

    /// Number of sentences per word, for the given words
    async fn count_by_words(&self, word_ids: &[i64]) -> Result<HashMap<i64, i64>>;
}

pub struct SqlxExampleSentenceRepository {
    pool: DynDatabasePool,
}

impl SqlxExampleSentenceRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ExampleSentenceRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ExampleSentenceRepository for SqlxExampleSentenceRepository {
    async fn create(&self, input: &ExampleSentenceInput) -> Result<ExampleSentence> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO example_sentences (word_id, text, translation, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(input.word_id)
        .bind(&input.text)
        .bind(&input.translation)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create example sentence")?;

        Ok(ExampleSentence {
            id: result.last_insert_rowid(),
            word_id: input.word_id,
            text: input.text.clone(),
            translation: input.translation.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ExampleSentence>> {
        let row = sqlx::query(
            "SELECT id, word_id, text, translation, created_at FROM example_sentences WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get example sentence")?;
        row.as_ref().map(row_to_example_sqlite).transpose()
    }

    async fn update(&self, id: i64, input: &ExampleSentenceInput) -> Result<Option<ExampleSentence>> {
        let result = sqlx::query(
            "UPDATE example_sentences SET word_id = ?, text = ?, translation = ? WHERE id = ?",
        )
        .bind(input.word_id)
        .bind(&input.text)
        .bind(&input.translation)
        .bind(id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update example sentence")?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM example_sentences WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete example sentence")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &ExampleSentenceFilter, params: &ListParams) -> Result<Vec<ExampleSentence>> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT e.id, e.word_id, e.text, e.translation, e.created_at FROM example_sentences e",
        );
        push_example_filter(&mut qb, filter);
        qb.push(" ORDER BY e.created_at DESC, e.id DESC LIMIT ");
        qb.push_bind(params.limit());
        qb.push(" OFFSET ");
        qb.push_bind(params.offset());

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list example sentences")?;
        rows.iter().map(row_to_example_sqlite).collect()
    }

    async fn count(&self, filter: &ExampleSentenceFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM example_sentences e");
        push_example_filter(&mut qb, filter);
        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count example sentences")?;
        Ok(count)
    }

    async fn count_by_words(&self, word_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if word_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT word_id, COUNT(*) AS example_count FROM example_sentences WHERE word_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in word_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") GROUP BY word_id");

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to count example sentences per word")?;

        rows.iter()
            .map(|row| Ok((row.try_get("word_id")?, row.try_get("example_count")?)))
            .collect()
    }
}

fn push_example_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ExampleSentenceFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(term) = search_term(filter.search.as_deref()) {
        let pattern = like_pattern(term);
        qb.push(" AND (e.text LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR e.translation LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR e.word_id IN (SELECT id FROM words WHERE text LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR definition LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\'))");
    }
    if let Some(word_id) = filter.word_id {
        qb.push(" AND e.word_id = ");
        qb.push_bind(word_id);
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND e.word_id IN (SELECT word_id FROM word_thematic_categories WHERE category_id = ");
        qb.push_bind(category_id);
        qb.push(")");
    }
}

fn row_to_example_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ExampleSentence> {
    Ok(ExampleSentence {
        id: row.try_get("id")?,
        word_id: row.try_get("word_id")?,
        text: row.try_get("text")?,
        translation: row.try_get("translation")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxWordRepository, WordRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::db::repositories::{SqlxThematicCategoryRepository, ThematicCategoryRepository};
    use crate::models::WordInput;

    #[tokio::test]
    async fn test_examples_per_word() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let words = SqlxWordRepository::new(pool.clone());
        let repo = SqlxExampleSentenceRepository::new(pool);

        let casa = words.create(&WordInput::new("casa", "house")).await.unwrap();
        let perro = words.create(&WordInput::new("perro", "dog")).await.unwrap();

        for text in ["Mi casa es tu casa.", "La casa es grande."] {
            repo.create(&ExampleSentenceInput {
                word_id: casa.id,
                text: text.to_string(),
                translation: None,
            })
            .await
            .unwrap();
        }

        let counts = repo.count_by_words(&[casa.id, perro.id]).await.unwrap();
        assert_eq!(counts.get(&casa.id), Some(&2));
        assert_eq!(counts.get(&perro.id), None);
        let for_casa = ExampleSentenceFilter {
            word_id: Some(casa.id),
            ..Default::default()
        };
        assert_eq!(repo.count(&for_casa).await.unwrap(), 2);
        assert_eq!(repo.count(&ExampleSentenceFilter::default()).await.unwrap(), 2);

        words.delete(casa.id).await.unwrap();
        assert_eq!(repo.count(&ExampleSentenceFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_example() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let word = SqlxWordRepository::new(pool.clone())
            .create(&WordInput::new("sol", "sun"))
            .await
            .unwrap();
        let repo = SqlxExampleSentenceRepository::new(pool);

        let created = repo
            .create(&ExampleSentenceInput {
                word_id: word.id,
                text: "Hace sol.".to_string(),
                translation: None,
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                created.id,
                &ExampleSentenceInput {
                    word_id: word.id,
                    text: "Hace mucho sol.".to_string(),
                    translation: Some("It is very sunny.".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(updated.has_translation());
        assert_eq!(updated.text, "Hace mucho sol.");
    }

    #[tokio::test]
    async fn test_search_and_category_filters() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let animales = SqlxThematicCategoryRepository::new(pool.clone())
            .create("Animales", None)
            .await
            .unwrap();
        let words = SqlxWordRepository::new(pool.clone());
        let gato = words
            .create(&WordInput::new("gato", "cat").with_categories(vec![animales.id]))
            .await
            .unwrap();
        let mesa = words.create(&WordInput::new("mesa", "table")).await.unwrap();
        let repo = SqlxExampleSentenceRepository::new(pool);

        for (word_id, text, translation) in [
            (gato.id, "El gato duerme.", Some("The cat sleeps.")),
            (mesa.id, "La mesa es de madera.", Some("The table is wooden.")),
            (mesa.id, "Pon la mesa.", None),
        ] {
            repo.create(&ExampleSentenceInput {
                word_id,
                text: text.to_string(),
                translation: translation.map(str::to_string),
            })
            .await
            .unwrap();
        }

        let search = |term: &str| ExampleSentenceFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };
        // sentence text, translation, word text and word definition
        assert_eq!(repo.count(&search("duerme")).await.unwrap(), 1);
        assert_eq!(repo.count(&search("WOODEN")).await.unwrap(), 1);
        assert_eq!(repo.count(&search("mesa")).await.unwrap(), 2);
        assert_eq!(repo.count(&search("table")).await.unwrap(), 2);
        assert_eq!(repo.count(&search("perro")).await.unwrap(), 0);

        let in_animales = ExampleSentenceFilter {
            category_id: Some(animales.id),
            ..Default::default()
        };
        let listed = repo.list(&in_animales, &ListParams::new(1, 20)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].text, "El gato duerme.");
    }
}

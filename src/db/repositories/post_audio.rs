//! Post audio repository
//!
//! Clips belong to a post and disappear with it (cascade). Listing order is
//! `(display_order, created_at)`.

use crate::db::DynDatabasePool;
use crate::models::PostAudio;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PostAudioRepository: Send + Sync {
    /// Insert a clip; `created_at` is set to now
    async fn create(&self, audio: &PostAudio) -> Result<PostAudio>;

    async fn get_by_id(&self, id: i64) -> Result<Option<PostAudio>>;

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<PostAudio>>;

    async fn update(&self, audio: &PostAudio) -> Result<PostAudio>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxPostAudioRepository {
    pool: DynDatabasePool,
}

impl SqlxPostAudioRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostAudioRepository> {
        Arc::new(Self::new(pool))
    }
}

const AUDIO_COLUMNS: &str =
    "id, post_id, title, audio_file, duration, description, display_order, created_at";

#[async_trait]
impl PostAudioRepository for SqlxPostAudioRepository {
    async fn create(&self, audio: &PostAudio) -> Result<PostAudio> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO post_audios (post_id, title, audio_file, duration, description, display_order, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(audio.post_id)
        .bind(&audio.title)
        .bind(&audio.audio_file)
        .bind(&audio.duration)
        .bind(&audio.description)
        .bind(audio.display_order)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create post audio")?;

        Ok(PostAudio {
            id: result.last_insert_rowid(),
            created_at: now,
            ..audio.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<PostAudio>> {
        let sql = format!("SELECT {} FROM post_audios WHERE id = ?", AUDIO_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get post audio")?;
        row.as_ref().map(row_to_audio_sqlite).transpose()
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<PostAudio>> {
        let sql = format!(
            "SELECT {} FROM post_audios WHERE post_id = ? ORDER BY display_order ASC, created_at ASC, id ASC",
            AUDIO_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(post_id)
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list post audios")?;
        rows.iter().map(row_to_audio_sqlite).collect()
    }

    async fn update(&self, audio: &PostAudio) -> Result<PostAudio> {
        sqlx::query(
            r#"
            UPDATE post_audios
            SET title = ?, audio_file = ?, duration = ?, description = ?, display_order = ?
            WHERE id = ?
            "#,
        )
        .bind(&audio.title)
        .bind(&audio.audio_file)
        .bind(&audio.duration)
        .bind(&audio.description)
        .bind(audio.display_order)
        .bind(audio.id)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to update post audio")?;
        Ok(audio.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM post_audios WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete post audio")?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_audio_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PostAudio> {
    Ok(PostAudio {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        title: row.try_get("title")?,
        audio_file: row.try_get("audio_file")?,
        duration: row.try_get("duration")?,
        description: row.try_get("description")?,
        display_order: row.try_get("display_order")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::post::tests::{draft, setup_with_author};
    use crate::db::repositories::PostRepository;

    fn clip(post_id: i64, title: &str, order: i64) -> PostAudio {
        PostAudio {
            id: 0,
            post_id,
            title: title.to_string(),
            audio_file: format!("audio/{}.mp3", title),
            duration: Some("1:30".to_string()),
            description: None,
            display_order: order,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_clips_are_ordered() {
        let (pool, posts, author) = setup_with_author().await;
        let post = posts.create(&draft("Audio", "audio", author)).await.unwrap();
        let repo = SqlxPostAudioRepository::new(pool);

        repo.create(&clip(post.id, "segunda", 2)).await.unwrap();
        repo.create(&clip(post.id, "primera", 1)).await.unwrap();
        repo.create(&clip(post.id, "tercera", 2)).await.unwrap();

        let titles: Vec<String> = repo
            .list_by_post(post.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["primera", "segunda", "tercera"]);
    }

    #[tokio::test]
    async fn test_clips_cascade_with_post() {
        let (pool, posts, author) = setup_with_author().await;
        let post = posts.create(&draft("Audio", "audio", author)).await.unwrap();
        let repo = SqlxPostAudioRepository::new(pool);
        let created = repo.create(&clip(post.id, "uno", 0)).await.unwrap();

        posts.delete(post.id).await.unwrap();
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }
}

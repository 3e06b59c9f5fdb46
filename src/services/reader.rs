//! Graded reader service
//!
//! Public listing and detail only show readers whose publication date has
//! been reached. The ordered difficulty level list is cached.

use crate::cache::{Cache, CacheLayer, LEVELS_KEY, READERS_PATTERN};
use crate::db::repositories::{DifficultyLevelRepository, ReaderRepository};
use crate::models::{
    DifficultyLevel, DifficultyLevelInput, ListParams, PagedResult, Reader, ReaderFilter,
    ReaderInput,
};
use crate::services::media::media_file_url;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

pub const READERS_PER_PAGE: u32 = 9;

pub const ADMIN_READERS_PER_PAGE: u32 = 20;

/// Maximum number of related readers on a detail page
pub const RELATED_READERS_LIMIT: i64 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ReaderServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

type Result<T> = std::result::Result<T, ReaderServiceError>;

#[derive(Debug, Clone, Serialize)]
pub struct ReaderView {
    #[serde(flatten)]
    pub reader: Reader,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderListing {
    pub readers: PagedResult<ReaderView>,
    pub difficulty_levels: Vec<DifficultyLevel>,
    pub search: String,
    pub level: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderDetail {
    #[serde(flatten)]
    pub view: ReaderView,
    pub related: Vec<ReaderView>,
}

pub struct ReaderService {
    levels: Arc<dyn DifficultyLevelRepository>,
    readers: Arc<dyn ReaderRepository>,
    cache: Arc<Cache>,
    media_url: String,
}

impl ReaderService {
    pub fn new(
        levels: Arc<dyn DifficultyLevelRepository>,
        readers: Arc<dyn ReaderRepository>,
        cache: Arc<Cache>,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            levels,
            readers,
            cache,
            media_url: media_url.into(),
        }
    }

    fn view(&self, reader: Reader) -> ReaderView {
        ReaderView {
            cover_url: reader
                .cover_image
                .as_deref()
                .map(|p| media_file_url(p, &self.media_url)),
            reader,
        }
    }

    // ========================================================================
    // Public reads
    // ========================================================================

    /// Readers published on or before `today`, filtered by search text and
    /// level number. A non-numeric `level` is ignored.
    pub async fn list_public(
        &self,
        search: Option<&str>,
        level: Option<&str>,
        page: Option<&str>,
        today: NaiveDate,
    ) -> Result<ReaderListing> {
        let level = level.and_then(|l| l.trim().parse::<i64>().ok());
        let filter = ReaderFilter {
            search: search.map(str::to_string),
            level_number: level,
            difficulty_level_id: None,
            published_on_or_before: Some(today),
        };

        let total = self.readers.count(&filter).await?;
        let params = ListParams::from_raw(page, READERS_PER_PAGE).clamp_to(total);
        let readers = self.readers.list(&filter, &params).await?;

        Ok(ReaderListing {
            readers: PagedResult::new(readers, total, &params).map(|r| self.view(r)),
            difficulty_levels: self.all_levels().await?,
            search: search.unwrap_or_default().to_string(),
            level,
        })
    }

    /// A published reader and up to four others of the same level.
    pub async fn get_public(&self, id: i64, today: NaiveDate) -> Result<ReaderDetail> {
        let reader = self
            .readers
            .get_by_id(id)
            .await?
            .filter(|r| r.publication_date <= today)
            .ok_or_else(|| ReaderServiceError::NotFound(format!("reader {}", id)))?;

        let related = self
            .readers
            .related(&reader, Some(today), RELATED_READERS_LIMIT)
            .await?
            .into_iter()
            .map(|r| self.view(r))
            .collect();

        Ok(ReaderDetail {
            view: self.view(reader),
            related,
        })
    }

    // ========================================================================
    // Difficulty levels
    // ========================================================================

    /// All levels ordered by level number (cached)
    pub async fn all_levels(&self) -> Result<Vec<DifficultyLevel>> {
        if let Some(cached) = self.cache.get::<Vec<DifficultyLevel>>(LEVELS_KEY).await? {
            return Ok(cached);
        }
        let levels = self.levels.list(None).await?;
        self.cache
            .set(LEVELS_KEY, &levels, self.cache.default_ttl())
            .await?;
        Ok(levels)
    }

    pub async fn list_levels(&self, search: Option<&str>) -> Result<Vec<DifficultyLevel>> {
        Ok(self.levels.list(search).await?)
    }

    pub async fn get_level(&self, id: i64) -> Result<DifficultyLevel> {
        self.levels
            .get_by_id(id)
            .await?
            .ok_or_else(|| ReaderServiceError::NotFound(format!("difficulty level {}", id)))
    }

    pub async fn create_level(&self, input: DifficultyLevelInput) -> Result<DifficultyLevel> {
        let input = self.validate_level(input, None).await?;
        let level = self.levels.create(&input).await?;
        self.cache.delete_pattern(READERS_PATTERN).await?;
        tracing::info!("Created difficulty level {}", level);
        Ok(level)
    }

    pub async fn update_level(&self, id: i64, input: DifficultyLevelInput) -> Result<DifficultyLevel> {
        let input = self.validate_level(input, Some(id)).await?;
        let level = self
            .levels
            .update(id, &input)
            .await?
            .ok_or_else(|| ReaderServiceError::NotFound(format!("difficulty level {}", id)))?;
        self.cache.delete_pattern(READERS_PATTERN).await?;
        Ok(level)
    }

    /// Delete a level together with all of its readers.
    pub async fn delete_level(&self, id: i64) -> Result<()> {
        if !self.levels.delete(id).await? {
            return Err(ReaderServiceError::NotFound(format!("difficulty level {}", id)));
        }
        self.cache.delete_pattern(READERS_PATTERN).await?;
        Ok(())
    }

    async fn validate_level(
        &self,
        mut input: DifficultyLevelInput,
        current_id: Option<i64>,
    ) -> Result<DifficultyLevelInput> {
        input.name = input.name.trim().to_string();
        if input.name.is_empty() {
            return Err(ReaderServiceError::ValidationError(
                "Level name cannot be empty".to_string(),
            ));
        }
        if input.level_number < 1 {
            return Err(ReaderServiceError::ValidationError(
                "Level number must be a positive integer".to_string(),
            ));
        }
        if let Some(existing) = self.levels.get_by_level_number(input.level_number).await? {
            if Some(existing.id) != current_id {
                return Err(ReaderServiceError::Conflict(format!(
                    "Level number {} is already used by '{}'",
                    input.level_number, existing.name
                )));
            }
        }
        Ok(input)
    }

    // ========================================================================
    // Readers (administration)
    // ========================================================================

    pub async fn list_admin(
        &self,
        filter: &ReaderFilter,
        page: Option<&str>,
    ) -> Result<PagedResult<Reader>> {
        let total = self.readers.count(filter).await?;
        let params = ListParams::from_raw(page, ADMIN_READERS_PER_PAGE).clamp_to(total);
        let readers = self.readers.list(filter, &params).await?;
        Ok(PagedResult::new(readers, total, &params))
    }

    pub async fn get(&self, id: i64) -> Result<Reader> {
        self.readers
            .get_by_id(id)
            .await?
            .ok_or_else(|| ReaderServiceError::NotFound(format!("reader {}", id)))
    }

    pub async fn create(&self, input: ReaderInput) -> Result<Reader> {
        let input = self.validate_reader(input).await?;
        let reader = self.readers.create(&input).await?;
        tracing::info!("Created reader '{}' ({})", reader.title, reader.id);
        Ok(reader)
    }

    pub async fn update(&self, id: i64, input: ReaderInput) -> Result<Reader> {
        let input = self.validate_reader(input).await?;
        self.readers
            .update(id, &input)
            .await?
            .ok_or_else(|| ReaderServiceError::NotFound(format!("reader {}", id)))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.readers.delete(id).await? {
            return Err(ReaderServiceError::NotFound(format!("reader {}", id)));
        }
        Ok(())
    }

    async fn validate_reader(&self, mut input: ReaderInput) -> Result<ReaderInput> {
        input.title = input.title.trim().to_string();
        input.author = input.author.trim().to_string();
        for (field, value) in [
            ("Title", &input.title),
            ("Author", &input.author),
            ("Description", &input.description),
            ("Content", &input.content),
        ] {
            if value.trim().is_empty() {
                return Err(ReaderServiceError::ValidationError(format!(
                    "{} cannot be empty",
                    field
                )));
            }
        }
        if input.word_count < 0 {
            return Err(ReaderServiceError::ValidationError(
                "Word count cannot be negative".to_string(),
            ));
        }
        if self.levels.get_by_id(input.difficulty_level_id).await?.is_none() {
            return Err(ReaderServiceError::ValidationError(format!(
                "Unknown difficulty level: {}",
                input.difficulty_level_id
            )));
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::reader::tests::{level, reader_input};
    use crate::db::repositories::{SqlxDifficultyLevelRepository, SqlxReaderRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> ReaderService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        ReaderService::new(
            SqlxDifficultyLevelRepository::boxed(pool.clone()),
            SqlxReaderRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
            "/media/",
        )
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_public_listing_hides_future_readers() {
        let service = setup().await;
        let beginner = service.create_level(level("Beginner", 1)).await.unwrap();

        let mut with_cover = reader_input("Publicado", beginner.id, day(2024, 1, 1));
        with_cover.cover_image = Some("reader_covers/uno.jpg".to_string());
        service.create(with_cover).await.unwrap();
        service
            .create(reader_input("Futuro", beginner.id, day(2099, 1, 1)))
            .await
            .unwrap();

        let listing = service
            .list_public(None, None, None, day(2025, 6, 1))
            .await
            .unwrap();
        assert_eq!(listing.readers.total, 1);
        assert_eq!(
            listing.readers.items[0].cover_url.as_deref(),
            Some("/media/reader_covers/uno.jpg")
        );
        assert_eq!(listing.difficulty_levels.len(), 1);
    }

    #[tokio::test]
    async fn test_level_filter_and_bad_level_param() {
        let service = setup().await;
        let one = service.create_level(level("Beginner", 1)).await.unwrap();
        let two = service.create_level(level("Intermediate", 2)).await.unwrap();
        service.create(reader_input("Uno", one.id, day(2024, 1, 1))).await.unwrap();
        service.create(reader_input("Dos", two.id, day(2024, 1, 1))).await.unwrap();

        let today = day(2025, 1, 1);
        let filtered = service.list_public(None, Some("2"), None, today).await.unwrap();
        assert_eq!(filtered.readers.total, 1);
        assert_eq!(filtered.readers.items[0].reader.title, "Dos");

        let ignored = service.list_public(None, Some("dos"), None, today).await.unwrap();
        assert_eq!(ignored.readers.total, 2);
    }

    #[tokio::test]
    async fn test_detail_with_related() {
        let service = setup().await;
        let one = service.create_level(level("Beginner", 1)).await.unwrap();
        let main = service.create(reader_input("Principal", one.id, day(2024, 1, 1))).await.unwrap();
        for title in ["A", "B", "C", "D", "E"] {
            service.create(reader_input(title, one.id, day(2024, 1, 1))).await.unwrap();
        }

        let detail = service.get_public(main.id, day(2025, 1, 1)).await.unwrap();
        assert_eq!(detail.related.len(), 4);
        assert!(matches!(
            service.get_public(main.id, day(2023, 1, 1)).await,
            Err(ReaderServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_level_validation_and_cache() {
        let service = setup().await;
        service.create_level(level("Beginner", 1)).await.unwrap();
        assert_eq!(service.all_levels().await.unwrap().len(), 1);

        assert!(matches!(
            service.create_level(level("Otra", 1)).await,
            Err(ReaderServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.create_level(level("Cero", 0)).await,
            Err(ReaderServiceError::ValidationError(_))
        ));

        service.create_level(level("Advanced", 3)).await.unwrap();
        assert_eq!(service.all_levels().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reader_validation() {
        let service = setup().await;
        let one = service.create_level(level("Beginner", 1)).await.unwrap();

        let mut negative = reader_input("Uno", one.id, day(2024, 1, 1));
        negative.word_count = -1;
        assert!(matches!(
            service.create(negative).await,
            Err(ReaderServiceError::ValidationError(_))
        ));
        assert!(matches!(
            service.create(reader_input("Uno", 999, day(2024, 1, 1))).await,
            Err(ReaderServiceError::ValidationError(_))
        ));
    }
}

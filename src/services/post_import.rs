//! Blog post importer
//!
//! Reads `blog_post` rows from a backup SQLite file and inserts them into the
//! live posts table. Authors are matched by id, falling back to the first
//! superuser. Colliding slugs get a numeric suffix. A failing row is logged
//! and counted; the run continues.

use crate::config::DatabaseConfig;
use crate::db::migrations::{run_migrations, table_exists};
use crate::db::repositories::{PostRepository, SqlxPostRepository, SqlxUserRepository, UserRepository};
use crate::db::{create_pool, DynDatabasePool};
use crate::models::Post;
use crate::services::backup::{open_backup, parse_timestamp};
use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SOURCE_TABLE: &str = "blog_post";

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Backup file not found: {}", .0.display())]
    BackupNotFound(PathBuf),

    #[error("No blog_post table found in backup")]
    MissingTable,

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub migrated: usize,
    pub failed: usize,
}

/// A `blog_post` row as stored by the previous site
#[derive(Debug, Clone)]
struct LegacyPost {
    id: i64,
    title: String,
    slug: String,
    content: String,
    image: Option<String>,
    is_published: bool,
    published_date: Option<String>,
    author_id: Option<i64>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl LegacyPost {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get::<Option<String>, _>("title")?.unwrap_or_default(),
            slug: row.try_get::<Option<String>, _>("slug")?.unwrap_or_default(),
            content: row.try_get::<Option<String>, _>("content")?.unwrap_or_default(),
            image: row
                .try_get::<Option<String>, _>("image")?
                .filter(|s| !s.trim().is_empty()),
            is_published: row.try_get::<Option<i64>, _>("is_published")?.unwrap_or(0) != 0,
            published_date: row.try_get("published_date")?,
            author_id: row.try_get("author_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Import every post of the backup at `backup_path` into `live`.
pub async fn import_posts(live: &DynDatabasePool, backup_path: &Path) -> Result<ImportReport, ImportError> {
    if !backup_path.is_file() {
        return Err(ImportError::BackupNotFound(backup_path.to_path_buf()));
    }

    tracing::info!("Importing posts from {}", backup_path.display());
    let source = open_backup(backup_path).await?;
    let result = import_from_source(live, &source).await;
    source.close().await;
    result
}

/// Open the live database described by `database`, bring its schema up to
/// date and import the backup's posts into it.
///
/// A missing backup is reported before the live database is opened.
pub async fn import_into_database(
    database: &DatabaseConfig,
    backup_path: &Path,
) -> Result<ImportReport, ImportError> {
    if !backup_path.is_file() {
        return Err(ImportError::BackupNotFound(backup_path.to_path_buf()));
    }

    let live = create_pool(database).await?;
    let result = match run_migrations(&live).await {
        Ok(_) => import_posts(&live, backup_path).await,
        Err(e) => Err(e.into()),
    };
    live.close().await;
    result
}

async fn import_from_source(live: &DynDatabasePool, source: &SqlitePool) -> Result<ImportReport, ImportError> {
    if !table_exists(source, SOURCE_TABLE).await? {
        return Err(ImportError::MissingTable);
    }

    let rows = sqlx::query(
        "SELECT id, title, slug, content, image, \
                CAST(is_published AS INTEGER) AS is_published, \
                CAST(published_date AS TEXT) AS published_date, \
                author_id, \
                CAST(created_at AS TEXT) AS created_at, \
                CAST(updated_at AS TEXT) AS updated_at \
         FROM blog_post ORDER BY id",
    )
    .fetch_all(source)
    .await
    .map_err(|e| anyhow!(e).context("Failed to read posts from backup"))?;

    let importer = Importer {
        posts: SqlxPostRepository::boxed(live.clone()),
        users: SqlxUserRepository::boxed(live.clone()),
    };

    let mut report = ImportReport {
        total: rows.len(),
        ..Default::default()
    };
    tracing::info!("Found {} posts to migrate", report.total);

    for row in &rows {
        let outcome = match LegacyPost::from_row(row) {
            Ok(legacy) => importer.import(&legacy, Utc::now()).await.map(|post| (legacy, post)),
            Err(e) => Err(e),
        };
        match outcome {
            Ok((legacy, post)) => {
                report.migrated += 1;
                if post.slug != legacy.slug {
                    tracing::info!("Migrated post {} as '{}' (slug was taken)", legacy.id, post.slug);
                } else {
                    tracing::info!("Migrated post {}: {}", legacy.id, post.title);
                }
            }
            Err(e) => {
                report.failed += 1;
                tracing::error!("Error migrating post: {:#}", e);
            }
        }
    }

    tracing::info!(
        "Migration complete: {} migrated, {} failed",
        report.migrated,
        report.failed
    );
    Ok(report)
}

struct Importer {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserRepository>,
}

impl Importer {
    async fn import(&self, legacy: &LegacyPost, now: DateTime<Utc>) -> Result<Post> {
        if legacy.title.trim().is_empty() {
            bail!("post {} has no title", legacy.id);
        }
        let author_id = self.resolve_author(legacy).await?;
        let slug = self.unique_slug(&legacy.slug, &legacy.title).await?;

        let post = Post {
            id: 0,
            title: legacy.title.clone(),
            slug,
            subtitle: None,
            excerpt: None,
            content: legacy.content.clone(),
            image: legacy.image.clone(),
            audio_file: None,
            audio_duration: None,
            is_published: legacy.is_published,
            published_date: legacy.published_date.as_deref().and_then(parse_timestamp),
            reviewed: false,
            review_notes: None,
            author_id,
            created_at: legacy.created_at.as_deref().and_then(parse_timestamp).unwrap_or(now),
            updated_at: legacy.updated_at.as_deref().and_then(parse_timestamp).unwrap_or(now),
        };
        self.posts.import(&post).await
    }

    async fn resolve_author(&self, legacy: &LegacyPost) -> Result<i64> {
        if let Some(id) = legacy.author_id {
            if let Some(user) = self.users.get_by_id(id).await? {
                return Ok(user.id);
            }
        }
        match self.users.first_superuser().await? {
            Some(user) => {
                tracing::warn!(
                    "Author of post {} not found, assigning to {}",
                    legacy.id,
                    user.username
                );
                Ok(user.id)
            }
            None => bail!("post {} has no author and no superuser exists", legacy.id),
        }
    }

    /// `base`, or `base-1`, `base-2`, ... for the first free one
    async fn unique_slug(&self, slug: &str, title: &str) -> Result<String> {
        let base = match slug.trim() {
            "" => super::post::generate_slug(title),
            s => s.to_string(),
        };
        if base.is_empty() {
            bail!("cannot derive a slug from '{}'", title);
        }
        let mut candidate = base.clone();
        let mut counter = 1;
        while self.posts.exists_by_slug(&candidate).await? {
            candidate = format!("{}-{}", base, counter);
            counter += 1;
        }
        Ok(candidate)
    }
}

//! Post repository
//!
//! Save rules:
//! - `create` sets `created_at`/`updated_at` to now
//! - `import` keeps the caller's `created_at`/`updated_at`
//! - `update` refreshes `updated_at`
//! - every save stamps `published_date` when a published post has none
//!
//! Deleting a post cascades to its audio clips.

use super::{like_pattern, search_term};
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Post, PostFilter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: &Post) -> Result<Post>;

    /// Insert preserving `created_at`/`updated_at` (used by the importer)
    async fn import(&self, post: &Post) -> Result<Post>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    async fn update(&self, post: &Post) -> Result<Post>;

    /// Returns false when no row matched
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Check if a slug is used by a different post (for updates)
    async fn exists_by_slug_excluding(&self, slug: &str, exclude_id: i64) -> Result<bool>;

    /// Live posts at `now`, newest publication first. `search` matches the
    /// title, case-insensitively.
    async fn list_live(
        &self,
        now: DateTime<Utc>,
        search: Option<&str>,
        params: &ListParams,
    ) -> Result<Vec<Post>>;

    async fn count_live(&self, now: DateTime<Utc>, search: Option<&str>) -> Result<i64>;

    /// All posts for administration, newest first
    async fn list_admin(&self, filter: &PostFilter, params: &ListParams) -> Result<Vec<Post>>;

    async fn count_admin(&self, filter: &PostFilter) -> Result<i64>;

    /// Publish the given posts with `published_date = now`
    async fn publish_many(&self, ids: &[i64], now: DateTime<Utc>) -> Result<u64>;

    async fn unpublish_many(&self, ids: &[i64]) -> Result<u64>;

    async fn set_reviewed_many(&self, ids: &[i64], reviewed: bool) -> Result<u64>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        let now = Utc::now();
        let post = Post {
            created_at: now,
            updated_at: now,
            ..post.clone()
        };
        insert_post_sqlite(self.pool.sqlite(), post, now).await
    }

    async fn import(&self, post: &Post) -> Result<Post> {
        insert_post_sqlite(self.pool.sqlite(), post.clone(), Utc::now()).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get post by ID")?;
        row.as_ref().map(row_to_post_sqlite).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE slug = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get post by slug")?;
        row.as_ref().map(row_to_post_sqlite).transpose()
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        update_post_sqlite(self.pool.sqlite(), post.clone(), Utc::now()).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete post")?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ?")
            .bind(slug)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to check slug existence")?;
        Ok(count > 0)
    }

    async fn exists_by_slug_excluding(&self, slug: &str, exclude_id: i64) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE slug = ? AND id != ?")
                .bind(slug)
                .bind(exclude_id)
                .fetch_one(self.pool.sqlite())
                .await
                .context("Failed to check slug existence")?;
        Ok(count > 0)
    }

    async fn list_live(
        &self,
        now: DateTime<Utc>,
        search: Option<&str>,
        params: &ListParams,
    ) -> Result<Vec<Post>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM posts", POST_COLUMNS));
        push_live_filter(&mut qb, now, search);
        qb.push(" ORDER BY published_date DESC, id DESC LIMIT ");
        qb.push_bind(params.limit());
        qb.push(" OFFSET ");
        qb.push_bind(params.offset());

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list live posts")?;
        rows.iter().map(row_to_post_sqlite).collect()
    }

    async fn count_live(&self, now: DateTime<Utc>, search: Option<&str>) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
        push_live_filter(&mut qb, now, search);
        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count live posts")?;
        Ok(count)
    }

    async fn list_admin(&self, filter: &PostFilter, params: &ListParams) -> Result<Vec<Post>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM posts", POST_COLUMNS));
        push_admin_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, updated_at DESC, id DESC LIMIT ");
        qb.push_bind(params.limit());
        qb.push(" OFFSET ");
        qb.push_bind(params.offset());

        let rows = qb
            .build()
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list posts")?;
        rows.iter().map(row_to_post_sqlite).collect()
    }

    async fn count_admin(&self, filter: &PostFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
        push_admin_filter(&mut qb, filter);
        let count: i64 = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to count posts")?;
        Ok(count)
    }

    async fn publish_many(&self, ids: &[i64], now: DateTime<Utc>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE posts SET is_published = 1, published_date = ");
        qb.push_bind(now);
        qb.push(", updated_at = ");
        qb.push_bind(now);
        push_id_list(&mut qb, ids);
        execute_bulk(self.pool.sqlite(), qb, "publish posts").await
    }

    async fn unpublish_many(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE posts SET is_published = 0, updated_at = ");
        qb.push_bind(Utc::now());
        push_id_list(&mut qb, ids);
        execute_bulk(self.pool.sqlite(), qb, "unpublish posts").await
    }

    async fn set_reviewed_many(&self, ids: &[i64], reviewed: bool) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE posts SET reviewed = ");
        qb.push_bind(reviewed);
        qb.push(", updated_at = ");
        qb.push_bind(Utc::now());
        push_id_list(&mut qb, ids);
        execute_bulk(self.pool.sqlite(), qb, "update review flag").await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const POST_COLUMNS: &str = "id, title, slug, subtitle, excerpt, content, image, audio_file, \
     audio_duration, is_published, published_date, reviewed, review_notes, author_id, \
     created_at, updated_at";

/// Published and due. Search uses the same filter, so scheduled posts never
/// show up in results before their date.
fn push_live_filter(qb: &mut QueryBuilder<'_, Sqlite>, now: DateTime<Utc>, search: Option<&str>) {
    qb.push(" WHERE is_published = 1 AND (published_date IS NULL OR published_date <= ");
    qb.push_bind(now);
    qb.push(")");
    if let Some(term) = search_term(search) {
        qb.push(" AND title LIKE ");
        qb.push_bind(like_pattern(term));
        qb.push(" ESCAPE '\\'");
    }
}

fn push_admin_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PostFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(is_published) = filter.is_published {
        qb.push(" AND is_published = ");
        qb.push_bind(is_published);
    }
    if let Some(reviewed) = filter.reviewed {
        qb.push(" AND reviewed = ");
        qb.push_bind(reviewed);
    }
    if let Some(term) = search_term(filter.search.as_deref()) {
        let pattern = like_pattern(term);
        qb.push(" AND (");
        for (i, column) in ["title", "content", "review_notes", "excerpt"].iter().enumerate() {
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
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    qb.push(" WHERE id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

async fn execute_bulk(pool: &SqlitePool, mut qb: QueryBuilder<'_, Sqlite>, what: &str) -> Result<u64> {
    let result = qb
        .build()
        .execute(pool)
        .await
        .with_context(|| format!("Failed to {}", what))?;
    Ok(result.rows_affected())
}

async fn insert_post_sqlite(pool: &SqlitePool, mut post: Post, now: DateTime<Utc>) -> Result<Post> {
    post.apply_publication_default(now);

    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, slug, subtitle, excerpt, content, image, audio_file, audio_duration,
                           is_published, published_date, reviewed, review_notes, author_id,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(&post.subtitle)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.image)
    .bind(&post.audio_file)
    .bind(&post.audio_duration)
    .bind(post.is_published)
    .bind(post.published_date)
    .bind(post.reviewed)
    .bind(&post.review_notes)
    .bind(post.author_id)
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    post.id = result.last_insert_rowid();
    Ok(post)
}

async fn update_post_sqlite(pool: &SqlitePool, mut post: Post, now: DateTime<Utc>) -> Result<Post> {
    post.apply_publication_default(now);
    post.updated_at = now;

    sqlx::query(
        r#"
        UPDATE posts
        SET title = ?, slug = ?, subtitle = ?, excerpt = ?, content = ?, image = ?,
            audio_file = ?, audio_duration = ?, is_published = ?, published_date = ?,
            reviewed = ?, review_notes = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.title)
    .bind(&post.slug)
    .bind(&post.subtitle)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.image)
    .bind(&post.audio_file)
    .bind(&post.audio_duration)
    .bind(post.is_published)
    .bind(post.published_date)
    .bind(post.reviewed)
    .bind(&post.review_notes)
    .bind(post.updated_at)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    Ok(post)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        subtitle: row.try_get("subtitle")?,
        excerpt: row.try_get("excerpt")?,
        content: row.try_get("content")?,
        image: row.try_get("image")?,
        audio_file: row.try_get("audio_file")?,
        audio_duration: row.try_get("audio_duration")?,
        is_published: row.try_get("is_published")?,
        published_date: row.try_get("published_date")?,
        reviewed: row.try_get("reviewed")?,
        review_notes: row.try_get("review_notes")?,
        author_id: row.try_get("author_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

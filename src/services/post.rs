//! Post service
//!
//! Public reads (live posts only, media placeholders expanded), editorial
//! CRUD, bulk actions and the audio clips attached to a post.

use crate::db::repositories::{PostAudioRepository, PostRepository};
use crate::models::{
    CreatePostAudioInput, CreatePostInput, ListParams, PagedResult, Post, PostAudio, PostFilter,
    PublicationState, UpdatePostAudioInput, UpdatePostInput,
};
use crate::services::media::{expand_media_placeholders, media_file_url};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Posts per page on the public blog
pub const POSTS_PER_PAGE: u32 = 9;

/// Posts per page in the admin list
pub const ADMIN_POSTS_PER_PAGE: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Post slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A post as shown to readers
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub state: PublicationState,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
}

/// Post page: the post and its ordered clips
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub view: PostView,
    pub audios: Vec<AudioView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioView {
    #[serde(flatten)]
    pub audio: PostAudio,
    pub url: String,
}

/// Admin bulk operations over selected posts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BulkAction {
    Publish,
    Unpublish,
    MarkReviewed,
    MarkUnreviewed,
}

impl BulkAction {
    fn message(&self, updated: u64) -> String {
        match self {
            BulkAction::Publish => format!("{} posts have been published.", updated),
            BulkAction::Unpublish => format!("{} posts have been unpublished.", updated),
            BulkAction::MarkReviewed => format!("{} posts have been marked as reviewed.", updated),
            BulkAction::MarkUnreviewed => {
                format!("{} posts have been marked as unreviewed.", updated)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    pub updated: u64,
    pub message: String,
}

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    audio_repo: Arc<dyn PostAudioRepository>,
    media_url: String,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        audio_repo: Arc<dyn PostAudioRepository>,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            audio_repo,
            media_url: media_url.into(),
        }
    }

    fn view(&self, mut post: Post, now: DateTime<Utc>) -> PostView {
        post.content = expand_media_placeholders(&post.content, &self.media_url);
        post.excerpt = post
            .excerpt
            .map(|e| expand_media_placeholders(&e, &self.media_url));
        PostView {
            state: post.publication_state(now),
            image_url: post.image.as_deref().map(|p| media_file_url(p, &self.media_url)),
            audio_url: post
                .audio_file
                .as_deref()
                .map(|p| media_file_url(p, &self.media_url)),
            post,
        }
    }

    // ========================================================================
    // Public reads
    // ========================================================================

    /// Live posts, newest publication first. `page` is the raw query value.
    pub async fn list_live(
        &self,
        page: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PagedResult<PostView>, PostServiceError> {
        self.search(None, page, now).await
    }

    /// Live posts whose title contains `query`; a blank query lists all live
    /// posts.
    pub async fn search(
        &self,
        query: Option<&str>,
        page: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PagedResult<PostView>, PostServiceError> {
        let total = self.repo.count_live(now, query).await?;
        let params = ListParams::from_raw(page, POSTS_PER_PAGE).clamp_to(total);
        let posts = self.repo.list_live(now, query, &params).await?;
        Ok(PagedResult::new(posts, total, &params).map(|p| self.view(p, now)))
    }

    /// A live post with its clips; drafts and scheduled posts are not found.
    pub async fn get_live_by_slug(
        &self,
        slug: &str,
        now: DateTime<Utc>,
    ) -> Result<PostDetail, PostServiceError> {
        let post = self
            .repo
            .get_by_slug(slug)
            .await?
            .filter(|p| p.is_live(now))
            .ok_or_else(|| PostServiceError::NotFound(slug.to_string()))?;

        let audios = self
            .audio_repo
            .list_by_post(post.id)
            .await?
            .into_iter()
            .map(|audio| AudioView {
                url: media_file_url(&audio.audio_file, &self.media_url),
                audio,
            })
            .collect();

        Ok(PostDetail {
            view: self.view(post, now),
            audios,
        })
    }

    // ========================================================================
    // Administration
    // ========================================================================

    pub async fn list_admin(
        &self,
        filter: &PostFilter,
        page: Option<&str>,
    ) -> Result<PagedResult<Post>, PostServiceError> {
        let total = self.repo.count_admin(filter).await?;
        let params = ListParams::from_raw(page, ADMIN_POSTS_PER_PAGE).clamp_to(total);
        let posts = self.repo.list_admin(filter, &params).await?;
        Ok(PagedResult::new(posts, total, &params))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Post, PostServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(id.to_string()))
    }

    /// Create a post. A blank slug is generated from the title; a taken slug
    /// is a conflict.
    pub async fn create(&self, input: CreatePostInput) -> Result<Post, PostServiceError> {
        validate_required("Title", &input.title)?;
        validate_required("Content", &input.content)?;

        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => validate_slug(slug)?,
            None => generate_slug(&input.title),
        };
        if slug.is_empty() {
            return Err(PostServiceError::ValidationError(
                "Slug cannot be generated from this title".to_string(),
            ));
        }
        if self.repo.exists_by_slug(&slug).await? {
            return Err(PostServiceError::DuplicateSlug(slug));
        }

        let now = Utc::now();
        let post = Post {
            id: 0,
            title: input.title.trim().to_string(),
            slug,
            subtitle: input.subtitle,
            excerpt: input.excerpt,
            content: input.content,
            image: input.image,
            audio_file: input.audio_file,
            audio_duration: input.audio_duration,
            is_published: input.is_published,
            published_date: input.published_date,
            reviewed: input.reviewed,
            review_notes: input.review_notes,
            author_id: input.author_id,
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&post).await?;
        tracing::info!("Created post '{}' ({})", created.slug, created.id);
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: UpdatePostInput) -> Result<Post, PostServiceError> {
        let mut post = self.get_by_id(id).await?;
        if !input.has_changes() {
            return Ok(post);
        }

        if let Some(title) = &input.title {
            validate_required("Title", title)?;
        }
        if let Some(content) = &input.content {
            validate_required("Content", content)?;
        }
        if let Some(slug) = &input.slug {
            let slug = validate_slug(slug.trim())?;
            if slug != post.slug && self.repo.exists_by_slug_excluding(&slug, id).await? {
                return Err(PostServiceError::DuplicateSlug(slug));
            }
            post.slug = slug;
        }

        input.apply_to(&mut post);
        Ok(self.repo.update(&post).await?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), PostServiceError> {
        if !self.repo.delete(id).await? {
            return Err(PostServiceError::NotFound(id.to_string()));
        }
        tracing::info!("Deleted post {}", id);
        Ok(())
    }

    /// Apply a bulk action. Publishing stamps `published_date` with `now`.
    pub async fn bulk_action(
        &self,
        action: BulkAction,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<BulkResult, PostServiceError> {
        let updated = match action {
            BulkAction::Publish => self.repo.publish_many(ids, now).await?,
            BulkAction::Unpublish => self.repo.unpublish_many(ids).await?,
            BulkAction::MarkReviewed => self.repo.set_reviewed_many(ids, true).await?,
            BulkAction::MarkUnreviewed => self.repo.set_reviewed_many(ids, false).await?,
        };
        Ok(BulkResult {
            updated,
            message: action.message(updated),
        })
    }

    // ========================================================================
    // Audio clips
    // ========================================================================

    pub async fn list_audios(&self, post_id: i64) -> Result<Vec<PostAudio>, PostServiceError> {
        self.get_by_id(post_id).await?;
        Ok(self.audio_repo.list_by_post(post_id).await?)
    }

    pub async fn create_audio(
        &self,
        input: CreatePostAudioInput,
    ) -> Result<PostAudio, PostServiceError> {
        self.get_by_id(input.post_id).await?;
        validate_required("Title", &input.title)?;
        validate_required("Audio file", &input.audio_file)?;

        let audio = PostAudio {
            id: 0,
            post_id: input.post_id,
            title: input.title,
            audio_file: input.audio_file,
            duration: input.duration,
            description: input.description,
            display_order: input.display_order,
            created_at: Utc::now(),
        };
        Ok(self.audio_repo.create(&audio).await?)
    }

    pub async fn update_audio(
        &self,
        id: i64,
        input: UpdatePostAudioInput,
    ) -> Result<PostAudio, PostServiceError> {
        let mut audio = self
            .audio_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| PostServiceError::NotFound(format!("audio {}", id)))?;

        if let Some(title) = &input.title {
            validate_required("Title", title)?;
        }
        if let Some(file) = &input.audio_file {
            validate_required("Audio file", file)?;
        }
        input.apply_to(&mut audio);
        Ok(self.audio_repo.update(&audio).await?)
    }

    pub async fn delete_audio(&self, id: i64) -> Result<(), PostServiceError> {
        if !self.audio_repo.delete(id).await? {
            return Err(PostServiceError::NotFound(format!("audio {}", id)));
        }
        Ok(())
    }
}

fn validate_required(field: &str, value: &str) -> Result<(), PostServiceError> {
    if value.trim().is_empty() {
        return Err(PostServiceError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}

/// Manual slugs may only contain ASCII letters, digits, `-` and `_`.
fn validate_slug(slug: &str) -> Result<String, PostServiceError> {
    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(PostServiceError::ValidationError(format!(
            "Invalid slug: '{}'",
            slug
        )));
    }
    Ok(slug.to_string())
}

fn fold_accent(c: char) -> Option<char> {
    let folded = match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        c if c.is_ascii() => c,
        _ => return None,
    };
    Some(folded)
}

/// URL slug from a title: lower-cased, Spanish accents folded to ASCII,
/// other non-ASCII dropped, separators collapsed into single hyphens.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars().filter_map(fold_accent) {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        }
    }
    slug
}

//! Blog post model
//!
//! This module provides:
//! - `Post` entity and its `PublicationState`
//! - `PostAudio` clips attached to a post
//! - Input types for creating and updating posts and clips
//!
//! Publication rules:
//! - a post is *live* when published and its date is not in the future
//! - a post is *scheduled* when published and its date is in the future
//! - a published post saved without a date gets `now`, once

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blog post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    pub title: String,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub subtitle: Option<String>,
    pub excerpt: Option<String>,
    /// Body; may contain `{{MEDIA:path}}` placeholders
    pub content: String,
    /// Header image path relative to the media root
    pub image: Option<String>,
    /// Legacy single audio attachment
    pub audio_file: Option<String>,
    /// Legacy audio duration label, e.g. "3:45"
    pub audio_duration: Option<String>,
    pub is_published: bool,
    pub published_date: Option<DateTime<Utc>>,
    /// Editorial review flag
    pub reviewed: bool,
    pub review_notes: Option<String>,
    /// Author user ID
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn publication_state(&self, now: DateTime<Utc>) -> PublicationState {
        PublicationState::resolve(self.is_published, self.published_date, now)
    }

    /// Published with a publication date still in the future
    pub fn is_scheduled(&self, now: DateTime<Utc>) -> bool {
        self.publication_state(now) == PublicationState::Scheduled
    }

    /// Published and visible to readers
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.publication_state(now) == PublicationState::Live
    }

    /// Stamp `published_date` with `now` when the post is published without a
    /// date. An existing date is never replaced.
    pub fn apply_publication_default(&mut self, now: DateTime<Utc>) {
        if self.is_published && self.published_date.is_none() {
            self.published_date = Some(now);
        }
    }
}

/// Mutually exclusive publication states of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    /// Not published
    Unpublished,
    /// Published with a date in the future
    Scheduled,
    /// Published and visible
    Live,
}

impl PublicationState {
    /// Resolve the state at `now`.
    ///
    /// A published post without a date counts as live; saving always stamps a
    /// date, so this only happens for rows written outside the repository.
    pub fn resolve(
        is_published: bool,
        published_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        match (is_published, published_date) {
            (false, _) => PublicationState::Unpublished,
            (true, Some(date)) if date > now => PublicationState::Scheduled,
            (true, _) => PublicationState::Live,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationState::Unpublished => "unpublished",
            PublicationState::Scheduled => "scheduled",
            PublicationState::Live => "live",
        }
    }
}

/// Input for creating a new post
#[derive(Debug, Clone, Default)]
pub struct CreatePostInput {
    pub title: String,
    /// Generated from the title when empty
    pub slug: Option<String>,
    pub subtitle: Option<String>,
    pub excerpt: Option<String>,
    pub content: String,
    pub image: Option<String>,
    pub audio_file: Option<String>,
    pub audio_duration: Option<String>,
    pub is_published: bool,
    pub published_date: Option<DateTime<Utc>>,
    pub reviewed: bool,
    pub review_notes: Option<String>,
    pub author_id: i64,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>, author_id: i64) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author_id,
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn published(mut self, published_date: Option<DateTime<Utc>>) -> Self {
        self.is_published = true;
        self.published_date = published_date;
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    pub fn with_review_notes(mut self, notes: impl Into<String>) -> Self {
        self.review_notes = Some(notes.into());
        self
    }
}

/// Input for updating a post.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears an optional
/// field.
#[derive(Debug, Clone, Default)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub subtitle: Option<Option<String>>,
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    pub image: Option<Option<String>>,
    pub audio_file: Option<Option<String>>,
    pub audio_duration: Option<Option<String>>,
    pub is_published: Option<bool>,
    pub published_date: Option<Option<DateTime<Utc>>>,
    pub reviewed: Option<bool>,
    pub review_notes: Option<Option<String>>,
}

impl UpdatePostInput {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_published(mut self, is_published: bool) -> Self {
        self.is_published = Some(is_published);
        self
    }

    pub fn with_published_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.published_date = Some(date);
        self
    }

    pub fn with_reviewed(mut self, reviewed: bool) -> Self {
        self.reviewed = Some(reviewed);
        self
    }

    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.slug.is_some()
            || self.subtitle.is_some()
            || self.excerpt.is_some()
            || self.content.is_some()
            || self.image.is_some()
            || self.audio_file.is_some()
            || self.audio_duration.is_some()
            || self.is_published.is_some()
            || self.published_date.is_some()
            || self.reviewed.is_some()
            || self.review_notes.is_some()
    }

    /// Apply the changes to `post` in place (slug excluded).
    pub fn apply_to(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(subtitle) = self.subtitle {
            post.subtitle = subtitle;
        }
        if let Some(excerpt) = self.excerpt {
            post.excerpt = excerpt;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(image) = self.image {
            post.image = image;
        }
        if let Some(audio_file) = self.audio_file {
            post.audio_file = audio_file;
        }
        if let Some(audio_duration) = self.audio_duration {
            post.audio_duration = audio_duration;
        }
        if let Some(is_published) = self.is_published {
            post.is_published = is_published;
        }
        if let Some(published_date) = self.published_date {
            post.published_date = published_date;
        }
        if let Some(reviewed) = self.reviewed {
            post.reviewed = reviewed;
        }
        if let Some(review_notes) = self.review_notes {
            post.review_notes = review_notes;
        }
    }
}

/// Filters for the admin post list
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub is_published: Option<bool>,
    pub reviewed: Option<bool>,
    /// Matches title, content, review notes or excerpt
    pub search: Option<String>,
}

/// Audio clip attached to a post, ordered by `(display_order, created_at)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAudio {
    pub id: i64,
    pub post_id: i64,
    pub title: String,
    /// Audio path relative to the media root
    pub audio_file: String,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePostAudioInput {
    pub post_id: i64,
    pub title: String,
    pub audio_file: String,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub display_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePostAudioInput {
    pub title: Option<String>,
    pub audio_file: Option<String>,
    pub duration: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub display_order: Option<i64>,
}

impl UpdatePostAudioInput {
    pub fn apply_to(self, audio: &mut PostAudio) {
        if let Some(title) = self.title {
            audio.title = title;
        }
        if let Some(audio_file) = self.audio_file {
            audio.audio_file = audio_file;
        }
        if let Some(duration) = self.duration {
            audio.duration = duration;
        }
        if let Some(description) = self.description {
            audio.description = description;
        }
        if let Some(display_order) = self.display_order {
            audio.display_order = display_order;
        }
    }
}

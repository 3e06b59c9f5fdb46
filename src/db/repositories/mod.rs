//! Database repositories
//!
//! One repository per entity. Each exposes a trait (the seam services depend
//! on) and an sqlx implementation over the shared SQLite pool.
//!
//! Timestamp rules shared by all repositories:
//! - `created_at` is set once, on insert
//! - `updated_at` is refreshed on every update
//! - posts get their publication default applied on every save

pub mod difficulty_level;
pub mod example_sentence;
pub mod post;
pub mod post_audio;
pub mod reader;
pub mod session;
pub mod thematic_category;
pub mod user;
pub mod word;

pub use difficulty_level::{DifficultyLevelRepository, SqlxDifficultyLevelRepository};
pub use example_sentence::{ExampleSentenceRepository, SqlxExampleSentenceRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use post_audio::{PostAudioRepository, SqlxPostAudioRepository};
pub use reader::{ReaderRepository, SqlxReaderRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use thematic_category::{SqlxThematicCategoryRepository, ThematicCategoryRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use word::{SqlxWordRepository, WordRepository};

/// Build a `LIKE` pattern matching `term` anywhere, for use with
/// `ESCAPE '\'`.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Trimmed search term, or `None` when blank
pub(crate) fn search_term(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("casa"), "%casa%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn test_search_term() {
        assert_eq!(search_term(Some("  ")), None);
        assert_eq!(search_term(Some(" sol ")), Some("sol"));
        assert_eq!(search_term(None), None);
    }
}

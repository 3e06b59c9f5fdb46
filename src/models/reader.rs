//! Graded reader models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal difficulty grouping for readers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyLevel {
    pub id: i64,
    /// e.g. "Beginner", "Intermediate"
    pub name: String,
    /// Unique positive ordinal
    pub level_number: i64,
    pub description: String,
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Level {})", self.name, self.level_number)
    }
}

#[derive(Debug, Clone)]
pub struct DifficultyLevelInput {
    pub name: String,
    pub level_number: i64,
    pub description: String,
}

/// Graded reading text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reader {
    pub id: i64,
    pub title: String,
    /// Free-text author name
    pub author: String,
    pub difficulty_level_id: i64,
    /// Joined from the difficulty level
    pub level_number: i64,
    pub level_name: String,
    pub description: String,
    pub content: String,
    pub publication_date: NaiveDate,
    /// Cover path relative to the media root
    pub cover_image: Option<String>,
    pub word_count: i64,
    pub vocabulary_focus: String,
    pub grammar_focus: String,
}

impl fmt::Display for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone)]
pub struct ReaderInput {
    pub title: String,
    pub author: String,
    pub difficulty_level_id: i64,
    pub description: String,
    pub content: String,
    pub publication_date: NaiveDate,
    pub cover_image: Option<String>,
    pub word_count: i64,
    pub vocabulary_focus: String,
    pub grammar_focus: String,
}

/// Filters for reader listings
#[derive(Debug, Clone, Default)]
pub struct ReaderFilter {
    /// Matches title, author, description, content or either focus field
    pub search: Option<String>,
    /// Level ordinal (public listing)
    pub level_number: Option<i64>,
    /// Level row id (admin listing)
    pub difficulty_level_id: Option<i64>,
    /// Only readers whose publication date is on or before this day
    pub published_on_or_before: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_display() {
        let level = DifficultyLevel {
            id: 1,
            name: "Beginner".to_string(),
            level_number: 1,
            description: String::new(),
        };
        assert_eq!(level.to_string(), "Beginner (Level 1)");
    }
}

//! Temario vocabulary models
//!
//! Words with grammatical gender, grouped into thematic categories and
//! illustrated by example sentences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Thematic category grouping words (e.g. "Comida", "Viajes")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThematicCategory {
    pub id: i64,
    /// Unique name, first character upper-cased on save
    pub name: String,
    pub description: Option<String>,
}

/// Category together with how many words it holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: ThematicCategory,
    pub word_count: i64,
}

/// Upper-case the first character and keep the rest as written.
pub fn capitalize_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
}

/// Grammatical gender of a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Masculine,
    Feminine,
    #[default]
    None,
}

impl Gender {
    /// Single-letter storage code
    pub fn code(&self) -> &'static str {
        match self {
            Gender::Masculine => "M",
            Gender::Feminine => "F",
            Gender::None => "N",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" => Some(Gender::Masculine),
            "F" => Some(Gender::Feminine),
            "N" => Some(Gender::None),
            _ => None,
        }
    }

    /// Definite article for gendered nouns
    pub fn article(&self) -> Option<&'static str> {
        match self {
            Gender::Masculine => Some("el"),
            Gender::Feminine => Some("la"),
            Gender::None => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Gender::Masculine => "Masculine",
            Gender::Feminine => "Feminine",
            Gender::None => "None",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(gender) = Gender::from_code(s) {
            return Ok(gender);
        }
        match s.to_lowercase().as_str() {
            "masculine" => Ok(Gender::Masculine),
            "feminine" => Ok(Gender::Feminine),
            "none" => Ok(Gender::None),
            _ => Err(anyhow::anyhow!("Invalid gender: {}", s)),
        }
    }
}

/// Vocabulary entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub id: i64,
    pub text: String,
    pub definition: String,
    pub gender: Gender,
    pub has_gender: bool,
    /// IDs of the categories this word belongs to
    #[serde(default)]
    pub category_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resolve the gender pair stored for a word.
///
/// A concrete gender forces `has_gender`; `Gender::None` clears it whatever
/// the incoming flag says. Afterwards `gender == None` exactly when
/// `has_gender` is false.
pub fn normalize_gender(gender: Gender, _has_gender: bool) -> (Gender, bool) {
    match gender {
        Gender::None => (Gender::None, false),
        gender => (gender, true),
    }
}

impl Word {
    /// Text with its definite article when gendered ("el libro", "la mesa").
    pub fn display_text(&self) -> String {
        display_text(&self.text, self.gender, self.has_gender)
    }

    pub fn normalize(&mut self) {
        let (gender, has_gender) = normalize_gender(self.gender, self.has_gender);
        self.gender = gender;
        self.has_gender = has_gender;
    }
}

pub fn display_text(text: &str, gender: Gender, has_gender: bool) -> String {
    match gender.article() {
        Some(article) if has_gender => format!("{} {}", article, text),
        _ => text.to_string(),
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

/// Input for creating or replacing a word
#[derive(Debug, Clone, Default)]
pub struct WordInput {
    pub text: String,
    pub definition: String,
    pub gender: Gender,
    pub has_gender: bool,
    pub category_ids: Vec<i64>,
}

impl WordInput {
    pub fn new(text: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            definition: definition.into(),
            ..Default::default()
        }
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self.has_gender = gender != Gender::None;
        self
    }

    pub fn with_categories(mut self, category_ids: Vec<i64>) -> Self {
        self.category_ids = category_ids;
        self
    }

    pub fn normalized(mut self) -> Self {
        let (gender, has_gender) = normalize_gender(self.gender, self.has_gender);
        self.gender = gender;
        self.has_gender = has_gender;
        self
    }
}

/// Filters for word listings
#[derive(Debug, Clone, Default)]
pub struct WordFilter {
    /// Matches text or definition
    pub search: Option<String>,
    pub category_id: Option<i64>,
    pub gender: Option<Gender>,
    pub has_gender: Option<bool>,
}

/// Filters for the admin example sentence listing
#[derive(Debug, Clone, Default)]
pub struct ExampleSentenceFilter {
    /// Matches the sentence, its translation, or the word's text or definition
    pub search: Option<String>,
    pub word_id: Option<i64>,
    /// Category of the sentence's word
    pub category_id: Option<i64>,
}

/// Example sentence illustrating a word
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub id: i64,
    pub word_id: i64,
    pub text: String,
    pub translation: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExampleSentence {
    pub fn has_translation(&self) -> bool {
        self.translation
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct ExampleSentenceInput {
    pub word_id: i64,
    pub text: String,
    pub translation: Option<String>,
}

//! Temario vocabulary service
//!
//! Thematic categories, words and example sentences, plus the computed
//! preview fields shown in the admin lists. The ordered category list is
//! cached and invalidated on every category write.

use crate::cache::{Cache, CacheLayer, CATEGORIES_KEY, TEMARIO_PATTERN};
use crate::db::repositories::{
    ExampleSentenceRepository, ThematicCategoryRepository, WordRepository,
};
use crate::models::{
    capitalize_first, CategoryInput, CategoryWithCount, ExampleSentence, ExampleSentenceFilter,
    ExampleSentenceInput, ListParams, PagedResult, ThematicCategory, Word, WordFilter, WordInput,
};
use crate::services::preview;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Words per page on the public list
pub const WORDS_PER_PAGE: u32 = 12;

/// Rows per page in the admin lists
pub const ADMIN_PER_PAGE: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum VocabularyServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

type Result<T> = std::result::Result<T, VocabularyServiceError>;

/// Word with its article and categories resolved
#[derive(Debug, Clone, Serialize)]
pub struct WordView {
    #[serde(flatten)]
    pub word: Word,
    pub display_text: String,
    pub categories: Vec<ThematicCategory>,
}

/// Public word list page
#[derive(Debug, Clone, Serialize)]
pub struct WordListing {
    pub words: PagedResult<WordView>,
    pub categories: Vec<ThematicCategory>,
    pub selected_category: Option<ThematicCategory>,
    pub search: String,
}

/// Word row of the admin list
#[derive(Debug, Clone, Serialize)]
pub struct WordAdminRow {
    #[serde(flatten)]
    pub word: Word,
    pub display_text: String,
    pub definition_preview: String,
    pub category_badges: String,
    pub gender_display: &'static str,
    pub example_count: i64,
}

/// Example sentence row of the admin list
#[derive(Debug, Clone, Serialize)]
pub struct ExampleAdminRow {
    #[serde(flatten)]
    pub example: ExampleSentence,
    pub text_preview: String,
    pub word_with_meaning: String,
    pub has_translation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateResult {
    pub created: Vec<Word>,
    pub messages: Vec<String>,
}

pub struct VocabularyService {
    categories: Arc<dyn ThematicCategoryRepository>,
    words: Arc<dyn WordRepository>,
    examples: Arc<dyn ExampleSentenceRepository>,
    cache: Arc<Cache>,
}

impl VocabularyService {
    pub fn new(
        categories: Arc<dyn ThematicCategoryRepository>,
        words: Arc<dyn WordRepository>,
        examples: Arc<dyn ExampleSentenceRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            categories,
            words,
            examples,
            cache,
        }
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// All categories ordered by name (cached)
    pub async fn all_categories(&self) -> Result<Vec<ThematicCategory>> {
        if let Some(cached) = self.cache.get::<Vec<ThematicCategory>>(CATEGORIES_KEY).await? {
            return Ok(cached);
        }
        let categories = self.categories.list_all().await?;
        self.cache
            .set(CATEGORIES_KEY, &categories, self.cache.default_ttl())
            .await?;
        Ok(categories)
    }

    async fn invalidate(&self) -> Result<()> {
        self.cache.delete_pattern(TEMARIO_PATTERN).await?;
        Ok(())
    }

    pub async fn list_categories(&self, search: Option<&str>) -> Result<Vec<CategoryWithCount>> {
        Ok(self.categories.list_with_counts(search).await?)
    }

    pub async fn get_category(&self, id: i64) -> Result<ThematicCategory> {
        self.categories
            .get_by_id(id)
            .await?
            .ok_or_else(|| VocabularyServiceError::NotFound(format!("category {}", id)))
    }

    pub async fn create_category(&self, input: CategoryInput) -> Result<ThematicCategory> {
        let name = self.category_name(&input.name, None).await?;
        let created = self
            .categories
            .create(&name, normalize_optional(input.description).as_deref())
            .await?;
        self.invalidate().await?;
        tracing::info!("Created thematic category '{}'", created.name);
        Ok(created)
    }

    pub async fn update_category(&self, id: i64, input: CategoryInput) -> Result<ThematicCategory> {
        let mut category = self.get_category(id).await?;
        category.name = self.category_name(&input.name, Some(id)).await?;
        category.description = normalize_optional(input.description);
        let updated = self.categories.update(&category).await?;
        self.invalidate().await?;
        Ok(updated)
    }

    /// Delete a category; its word links go with it, the words stay.
    pub async fn delete_category(&self, id: i64) -> Result<()> {
        if !self.categories.delete(id).await? {
            return Err(VocabularyServiceError::NotFound(format!("category {}", id)));
        }
        self.invalidate().await
    }

    /// Capitalized, non-blank, unused name
    async fn category_name(&self, raw: &str, current_id: Option<i64>) -> Result<String> {
        let name = capitalize_first(raw.trim());
        if name.is_empty() {
            return Err(VocabularyServiceError::ValidationError(
                "Category name cannot be empty".to_string(),
            ));
        }
        if let Some(existing) = self.categories.get_by_name(&name).await? {
            if Some(existing.id) != current_id {
                return Err(VocabularyServiceError::Conflict(format!(
                    "Category '{}' already exists",
                    existing.name
                )));
            }
        }
        Ok(name)
    }

    // ========================================================================
    // Words
    // ========================================================================

    /// Public word list. `category` filters only when it is all digits.
    pub async fn list_words(
        &self,
        search: Option<&str>,
        category: Option<&str>,
        page: Option<&str>,
    ) -> Result<WordListing> {
        let category_id = parse_category_param(category);
        let filter = WordFilter {
            search: search.map(str::to_string),
            category_id,
            ..Default::default()
        };

        let total = self.words.count(&filter).await?;
        let params = ListParams::from_raw(page, WORDS_PER_PAGE).clamp_to(total);
        let words = self.words.list(&filter, &params).await?;

        let categories = self.all_categories().await?;
        let by_id = index_categories(&categories);
        let selected_category = category_id.and_then(|id| by_id.get(&id).map(|c| (*c).clone()));
        let page = PagedResult::new(words, total, &params).map(|w| word_view(w, &by_id));

        Ok(WordListing {
            words: page,
            selected_category,
            categories,
            search: search.unwrap_or_default().to_string(),
        })
    }

    pub async fn get_word(&self, id: i64) -> Result<WordView> {
        let word = self
            .words
            .get_by_id(id)
            .await?
            .ok_or_else(|| VocabularyServiceError::NotFound(format!("word {}", id)))?;
        let categories = self.all_categories().await?;
        Ok(word_view(word, &index_categories(&categories)))
    }

    pub async fn list_words_admin(
        &self,
        filter: &WordFilter,
        page: Option<&str>,
    ) -> Result<PagedResult<WordAdminRow>> {
        let total = self.words.count(filter).await?;
        let params = ListParams::from_raw(page, ADMIN_PER_PAGE).clamp_to(total);
        let words = self.words.list(filter, &params).await?;

        let ids: Vec<i64> = words.iter().map(|w| w.id).collect();
        let counts = self.examples.count_by_words(&ids).await?;
        let categories = self.all_categories().await?;
        let by_id = index_categories(&categories);

        Ok(PagedResult::new(words, total, &params).map(|word| {
            let word_categories = categories_of(&word, &by_id);
            WordAdminRow {
                display_text: word.display_text(),
                definition_preview: preview::definition_preview(&word.definition),
                category_badges: preview::category_badges(&word_categories),
                gender_display: preview::gender_display(word.gender, word.has_gender),
                example_count: counts.get(&word.id).copied().unwrap_or(0),
                word,
            }
        }))
    }

    /// Create a word; a blank definition is rejected before any write.
    pub async fn create_word(&self, input: WordInput) -> Result<Word> {
        let input = self.validate_word(input).await?;
        let word = self.words.create(&input).await?;
        tracing::info!("Created word '{}' ({})", word.display_text(), word.id);
        Ok(word)
    }

    pub async fn update_word(&self, id: i64, input: WordInput) -> Result<Word> {
        let input = self.validate_word(input).await?;
        self.words
            .update(id, &input)
            .await?
            .ok_or_else(|| VocabularyServiceError::NotFound(format!("word {}", id)))
    }

    pub async fn delete_word(&self, id: i64) -> Result<()> {
        if !self.words.delete(id).await? {
            return Err(VocabularyServiceError::NotFound(format!("word {}", id)));
        }
        Ok(())
    }

    /// Copy each selected word as a new entry with the same text and gender,
    /// no definition and no categories, to be completed by hand.
    pub async fn duplicate_words(&self, ids: &[i64]) -> Result<DuplicateResult> {
        let mut result = DuplicateResult {
            created: Vec::new(),
            messages: Vec::new(),
        };
        for word in self.words.get_many(ids).await? {
            let copy = WordInput {
                text: word.text.clone(),
                definition: String::new(),
                gender: word.gender,
                has_gender: word.has_gender,
                category_ids: Vec::new(),
            };
            let created = self.words.create(&copy).await?;
            result.messages.push(format!(
                "Created a new entry for '{}' - please add a definition and categories.",
                word.text
            ));
            result.created.push(created);
        }
        Ok(result)
    }

    async fn validate_word(&self, mut input: WordInput) -> Result<WordInput> {
        input.text = input.text.trim().to_string();
        if input.text.is_empty() {
            return Err(VocabularyServiceError::ValidationError(
                "Word text cannot be empty".to_string(),
            ));
        }
        if input.definition.trim().is_empty() {
            return Err(VocabularyServiceError::ValidationError(
                "A definition must be provided for this word.".to_string(),
            ));
        }

        let known = self.all_categories().await?;
        if let Some(missing) = input
            .category_ids
            .iter()
            .find(|id| !known.iter().any(|c| c.id == **id))
        {
            return Err(VocabularyServiceError::ValidationError(format!(
                "Unknown thematic category: {}",
                missing
            )));
        }
        Ok(input.normalized())
    }

    // ========================================================================
    // Example sentences
    // ========================================================================

    pub async fn list_examples_admin(
        &self,
        filter: &ExampleSentenceFilter,
        page: Option<&str>,
    ) -> Result<PagedResult<ExampleAdminRow>> {
        let total = self.examples.count(filter).await?;
        let params = ListParams::from_raw(page, ADMIN_PER_PAGE).clamp_to(total);
        let examples = self.examples.list(filter, &params).await?;

        let mut word_ids: Vec<i64> = examples.iter().map(|e| e.word_id).collect();
        word_ids.sort_unstable();
        word_ids.dedup();
        let words: HashMap<i64, Word> = self
            .words
            .get_many(&word_ids)
            .await?
            .into_iter()
            .map(|w| (w.id, w))
            .collect();
        let categories = self.all_categories().await?;
        let by_id = index_categories(&categories);

        Ok(PagedResult::new(examples, total, &params).map(|example| {
            let word_with_meaning = words
                .get(&example.word_id)
                .map(|w| preview::word_with_meaning(w, &categories_of(w, &by_id)))
                .unwrap_or_else(|| preview::EMPTY.to_string());
            ExampleAdminRow {
                text_preview: preview::example_text_preview(&example.text),
                has_translation: example.has_translation(),
                word_with_meaning,
                example,
            }
        }))
    }

    pub async fn get_example(&self, id: i64) -> Result<ExampleSentence> {
        self.examples
            .get_by_id(id)
            .await?
            .ok_or_else(|| VocabularyServiceError::NotFound(format!("example {}", id)))
    }

    pub async fn create_example(&self, input: ExampleSentenceInput) -> Result<ExampleSentence> {
        let input = self.validate_example(input).await?;
        Ok(self.examples.create(&input).await?)
    }

    pub async fn update_example(
        &self,
        id: i64,
        input: ExampleSentenceInput,
    ) -> Result<ExampleSentence> {
        let input = self.validate_example(input).await?;
        self.examples
            .update(id, &input)
            .await?
            .ok_or_else(|| VocabularyServiceError::NotFound(format!("example {}", id)))
    }

    pub async fn delete_example(&self, id: i64) -> Result<()> {
        if !self.examples.delete(id).await? {
            return Err(VocabularyServiceError::NotFound(format!("example {}", id)));
        }
        Ok(())
    }

    async fn validate_example(&self, mut input: ExampleSentenceInput) -> Result<ExampleSentenceInput> {
        if input.text.trim().is_empty() {
            return Err(VocabularyServiceError::ValidationError(
                "Example text cannot be empty".to_string(),
            ));
        }
        if self.words.get_by_id(input.word_id).await?.is_none() {
            return Err(VocabularyServiceError::ValidationError(format!(
                "Unknown word: {}",
                input.word_id
            )));
        }
        input.translation = normalize_optional(input.translation);
        Ok(input)
    }
}

/// Category id from the raw query value; anything but digits is ignored.
pub fn parse_category_param(raw: Option<&str>) -> Option<i64> {
    raw.filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse().ok())
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn index_categories(categories: &[ThematicCategory]) -> HashMap<i64, &ThematicCategory> {
    categories.iter().map(|c| (c.id, c)).collect()
}

/// A word's categories ordered by name
fn categories_of(word: &Word, by_id: &HashMap<i64, &ThematicCategory>) -> Vec<ThematicCategory> {
    let mut categories: Vec<ThematicCategory> = word
        .category_ids
        .iter()
        .filter_map(|id| by_id.get(id).map(|c| (*c).clone()))
        .collect();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    categories
}

fn word_view(word: Word, by_id: &HashMap<i64, &ThematicCategory>) -> WordView {
    WordView {
        display_text: word.display_text(),
        categories: categories_of(&word, by_id),
        word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxExampleSentenceRepository, SqlxThematicCategoryRepository, SqlxWordRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::Gender;

    async fn setup() -> VocabularyService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        VocabularyService::new(
            SqlxThematicCategoryRepository::boxed(pool.clone()),
            SqlxWordRepository::boxed(pool.clone()),
            SqlxExampleSentenceRepository::boxed(pool),
            Arc::new(MemoryCache::new()),
        )
    }

    fn category(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_parse_category_param() {
        assert_eq!(parse_category_param(Some("12")), Some(12));
        assert_eq!(parse_category_param(Some("")), None);
        assert_eq!(parse_category_param(Some("-1")), None);
        assert_eq!(parse_category_param(Some("abc")), None);
        assert_eq!(parse_category_param(None), None);
    }

    #[tokio::test]
    async fn test_category_name_capitalized_and_unique() {
        let service = setup().await;
        let created = service.create_category(category("  comida ")).await.unwrap();
        assert_eq!(created.name, "Comida");

        assert!(matches!(
            service.create_category(category("comida")).await,
            Err(VocabularyServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.create_category(category("   ")).await,
            Err(VocabularyServiceError::ValidationError(_))
        ));

        // same name on the same row is fine
        service.update_category(created.id, category("comida")).await.unwrap();
    }

    #[tokio::test]
    async fn test_category_cache_invalidated_on_write() {
        let service = setup().await;
        service.create_category(category("viajes")).await.unwrap();
        assert_eq!(service.all_categories().await.unwrap().len(), 1);

        service.create_category(category("animales")).await.unwrap();
        let names: Vec<String> = service
            .all_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Animales", "Viajes"]);
    }

    #[tokio::test]
    async fn test_blank_definition_rejected_without_write() {
        let service = setup().await;
        let result = service.create_word(WordInput::new("casa", "   ")).await;
        assert!(matches!(result, Err(VocabularyServiceError::ValidationError(_))));

        let listing = service.list_words(None, None, None).await.unwrap();
        assert_eq!(listing.words.total, 0);
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let service = setup().await;
        let result = service
            .create_word(WordInput::new("casa", "house").with_categories(vec![42]))
            .await;
        assert!(matches!(result, Err(VocabularyServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_public_listing_filters_by_digit_category() {
        let service = setup().await;
        let comida = service.create_category(category("comida")).await.unwrap();
        service
            .create_word(WordInput::new("pan", "bread").with_gender(Gender::Masculine).with_categories(vec![comida.id]))
            .await
            .unwrap();
        service.create_word(WordInput::new("correr", "to run")).await.unwrap();

        let id = comida.id.to_string();
        let filtered = service.list_words(None, Some(&id), None).await.unwrap();
        assert_eq!(filtered.words.total, 1);
        assert_eq!(filtered.words.items[0].display_text, "el pan");
        assert_eq!(filtered.selected_category.map(|c| c.name), Some("Comida".to_string()));

        let ignored = service.list_words(None, Some("comida"), None).await.unwrap();
        assert_eq!(ignored.words.total, 2);
        assert!(ignored.selected_category.is_none());

        let searched = service.list_words(Some("RUN"), None, Some("0")).await.unwrap();
        assert_eq!(searched.words.total, 1);
        assert_eq!(searched.words.page, 1);
    }

    #[tokio::test]
    async fn test_admin_rows_and_duplicate() {
        let service = setup().await;
        let comida = service.create_category(category("comida")).await.unwrap();
        let word = service
            .create_word(
                WordInput::new("manzana", "apple")
                    .with_gender(Gender::Feminine)
                    .with_categories(vec![comida.id]),
            )
            .await
            .unwrap();
        service
            .create_example(ExampleSentenceInput {
                word_id: word.id,
                text: "Como una manzana.".to_string(),
                translation: Some("  ".to_string()),
            })
            .await
            .unwrap();

        let rows = service
            .list_words_admin(&WordFilter::default(), None)
            .await
            .unwrap();
        let row = &rows.items[0];
        assert_eq!(row.display_text, "la manzana");
        assert_eq!(row.gender_display, "♀ Feminine");
        assert_eq!(row.example_count, 1);
        assert!(row.category_badges.contains(">Comida</span>"));

        let for_word = ExampleSentenceFilter {
            word_id: Some(word.id),
            ..Default::default()
        };
        let examples = service.list_examples_admin(&for_word, None).await.unwrap();
        assert!(!examples.items[0].has_translation);
        assert!(examples.items[0].word_with_meaning.starts_with("<strong>la manzana</strong>"));

        let duplicated = service.duplicate_words(&[word.id]).await.unwrap();
        assert_eq!(duplicated.created.len(), 1);
        assert_eq!(duplicated.created[0].definition, "");
        assert_eq!(duplicated.created[0].gender, Gender::Feminine);
        assert!(duplicated.created[0].category_ids.is_empty());
        assert_eq!(
            duplicated.messages[0],
            "Created a new entry for 'manzana' - please add a definition and categories."
        );
    }

    #[tokio::test]
    async fn test_example_requires_existing_word() {
        let service = setup().await;
        let result = service
            .create_example(ExampleSentenceInput {
                word_id: 7,
                text: "Hola".to_string(),
                translation: None,
            })
            .await;
        assert!(matches!(result, Err(VocabularyServiceError::ValidationError(_))));
    }
}

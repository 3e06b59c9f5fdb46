//! Computed preview fields for the admin lists
//!
//! Category names and word text are HTML-escaped before they are wrapped in
//! markup.

use crate::models::{display_text, Gender, ThematicCategory, Word};

/// Placeholder shown for empty values
pub const EMPTY: &str = "—";

const BADGE_STYLE: &str =
    "background-color:#000000; color:#ffffff; padding:2px 5px; border-radius:3px; margin-right:3px;";

const SMALL_BADGE_STYLE: &str =
    "background-color:#000000; color:#ffffff; padding:1px 4px; border-radius:3px; font-size:0.9em;";

/// First `max_chars` characters followed by `...` when the text is longer.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Word definition cut to 100 characters, or `—` when empty
pub fn definition_preview(definition: &str) -> String {
    if definition.is_empty() {
        return EMPTY.to_string();
    }
    truncate_chars(definition, 100)
}

/// Example sentence text cut to 75 characters
pub fn example_text_preview(text: &str) -> String {
    truncate_chars(text, 75)
}

fn badges(categories: &[ThematicCategory], style: &str) -> String {
    categories
        .iter()
        .map(|c| {
            format!(
                r#"<span style="{}">{}</span>"#,
                style,
                html_escape::encode_text(&c.name)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Category names as black badges joined by `, `, or `—` when there are none
pub fn category_badges(categories: &[ThematicCategory]) -> String {
    if categories.is_empty() {
        return EMPTY.to_string();
    }
    badges(categories, BADGE_STYLE)
}

pub fn gender_display(gender: Gender, has_gender: bool) -> &'static str {
    if !has_gender {
        return EMPTY;
    }
    match gender {
        Gender::Masculine => "♂ Masculine",
        Gender::Feminine => "♀ Feminine",
        Gender::None => EMPTY,
    }
}

/// `<strong>el casa</strong> (badges) - definition` summary for an example
/// sentence's word
pub fn word_with_meaning(word: &Word, categories: &[ThematicCategory]) -> String {
    let text = display_text(&word.text, word.gender, word.has_gender);
    let mut html = format!("<strong>{}</strong>", html_escape::encode_text(&text));

    if !categories.is_empty() {
        html.push_str(&format!(" ({})", badges(categories, SMALL_BADGE_STYLE)));
    }
    if !word.definition.is_empty() {
        let preview = truncate_chars(&word.definition, 50);
        html.push_str(&format!(" - {}", html_escape::encode_text(&preview)));
    }
    html
}

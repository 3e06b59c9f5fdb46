//! Media placeholder expansion
//!
//! Post bodies reference uploaded files as `{{MEDIA:path/to/file}}`; at
//! display time each placeholder becomes `<media_url>/<path>`.

use once_cell::sync::Lazy;
use regex::Regex;

static MEDIA_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{MEDIA:(.*?)\}\}").expect("valid media regex"));

/// Expand every `{{MEDIA:...}}` placeholder against `media_url`.
///
/// Trailing slashes on the base and surrounding whitespace or leading slashes
/// on the path are dropped, so exactly one `/` joins them.
pub fn expand_media_placeholders(content: &str, media_url: &str) -> String {
    let base = media_url.trim_end_matches('/');
    MEDIA_PLACEHOLDER
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let path = caps[1].trim().trim_start_matches('/');
            format!("{}/{}", base, path)
        })
        .into_owned()
}

/// Public URL of a stored media path, e.g. a post image or reader cover.
pub fn media_file_url(path: &str, media_url: &str) -> String {
    format!(
        "{}/{}",
        media_url.trim_end_matches('/'),
        path.trim().trim_start_matches('/')
    )
}

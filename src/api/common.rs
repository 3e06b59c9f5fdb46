//! Common API utilities and shared types
//!
//! Query parameters are taken as raw strings and interpreted by the services,
//! so a malformed `page` or filter never turns into a 400.

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::PagedResult;

/// Raw `?page=` parameter
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Request body for bulk actions over selected rows
#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<i64>,
}

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> From<PagedResult<T>> for PageResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        Self {
            total_pages: result.total_pages(),
            has_next: result.has_next(),
            has_prev: result.has_prev(),
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            items: result.items,
        }
    }
}

/// Admin list filter value: `"true"`/`"1"` and `"false"`/`"0"`; anything
/// else (including empty) means no filter.
pub fn parse_bool_filter(raw: Option<&str>) -> Option<bool> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("true") | Some("1") | Some("yes") => Some(true),
        Some("false") | Some("0") | Some("no") => Some(false),
        _ => None,
    }
}

/// Numeric id filter; anything but an integer means no filter.
pub fn parse_id_filter(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// Distinguish an absent field from an explicit `null` in update bodies:
/// absent → `None`, `null` → `Some(None)`, value → `Some(Some(v))`.
/// Use together with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        nickname: Option<Option<String>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.nickname, None);

        let cleared: Patch = serde_json::from_str(r#"{"nickname": null}"#).unwrap();
        assert_eq!(cleared.nickname, Some(None));

        let set: Patch = serde_json::from_str(r#"{"nickname": "Pepa"}"#).unwrap();
        assert_eq!(set.nickname, Some(Some("Pepa".to_string())));
    }

    #[test]
    fn test_filters() {
        assert_eq!(parse_bool_filter(Some("true")), Some(true));
        assert_eq!(parse_bool_filter(Some("0")), Some(false));
        assert_eq!(parse_bool_filter(Some("")), None);
        assert_eq!(parse_bool_filter(None), None);
        assert_eq!(parse_id_filter(Some("12")), Some(12));
        assert_eq!(parse_id_filter(Some("doce")), None);
    }

    #[test]
    fn test_page_response() {
        let params = crate::models::ListParams::new(2, 3);
        let response: PageResponse<i32> = PagedResult::new(vec![4, 5, 6], 7, &params).into();
        assert_eq!(response.total_pages, 3);
        assert!(response.has_next);
        assert!(response.has_prev);
    }
}

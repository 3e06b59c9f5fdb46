//! Pagination types for list queries
//!
//! Listing endpoints never fail because of a bad page parameter: anything that
//! is not a positive integer means page 1, and pages past the end clamp to the
//! last page. An empty result still has one (empty) page.

use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Build parameters from a raw query-string page value.
    pub fn from_raw(raw: Option<&str>, per_page: u32) -> Self {
        Self::new(parse_page(raw), per_page)
    }

    /// Clamp the page number to the last page for `total` items.
    pub fn clamp_to(self, total: i64) -> Self {
        let last = page_count(total, self.per_page);
        Self {
            page: self.page.min(last),
            per_page: self.per_page,
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Interpret a raw page parameter.
///
/// Missing, blank, non-numeric, zero and negative values all mean page 1.
/// Integers too large for `u32` saturate, so they clamp to the last page.
pub fn parse_page(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return 1;
    };
    match raw.parse::<u64>() {
        Ok(0) => 1,
        Ok(n) => n.min(u32::MAX as u64) as u32,
        Err(_) if raw.bytes().all(|b| b.is_ascii_digit()) => u32::MAX,
        Err(_) => 1,
    }
}

/// Number of pages needed for `total` items; never less than one.
pub fn page_count(total: i64, per_page: u32) -> u32 {
    let per_page = per_page.max(1) as i64;
    let total = total.max(0);
    let pages = (total + per_page - 1) / per_page;
    pages.clamp(1, u32::MAX as i64) as u32
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        page_count(self.total, self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Transform the items, keeping the paging metadata
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_page_fallbacks() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-4")), 1);
        assert_eq!(parse_page(Some("2.5")), 1);
        assert_eq!(parse_page(Some(" 3 ")), 3);
        assert_eq!(parse_page(Some("99999999999999999999999")), u32::MAX);
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 9), 1);
        assert_eq!(page_count(9, 9), 1);
        assert_eq!(page_count(10, 9), 2);
        assert_eq!(page_count(27, 9), 3);
    }

    #[test]
    fn test_clamp_to_last_page() {
        let params = ListParams::from_raw(Some("999"), 12).clamp_to(30);
        assert_eq!(params.page, 3);
        assert_eq!(params.offset(), 24);

        let empty = ListParams::from_raw(Some("5"), 12).clamp_to(0);
        assert_eq!(empty.page, 1);
        assert_eq!(empty.offset(), 0);
    }

    #[test]
    fn test_paged_result_navigation() {
        let params = ListParams::new(2, 9);
        let result = PagedResult::new(vec![1, 2, 3], 21, &params);
        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next());
        assert!(result.has_prev());

        let doubled = result.map(|n| n * 2);
        assert_eq!(doubled.items, vec![2, 4, 6]);
        assert_eq!(doubled.page, 2);
    }

    proptest! {
        #[test]
        fn prop_clamped_page_is_always_valid(raw in ".{0,12}", total in 0i64..10_000, per_page in 1u32..50) {
            let params = ListParams::from_raw(Some(&raw), per_page).clamp_to(total);
            prop_assert!(params.page >= 1);
            prop_assert!(params.page <= page_count(total, params.per_page));
            prop_assert!(params.offset() <= total.max(0));
        }
    }
}

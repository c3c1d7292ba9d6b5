//! Pagination types for list endpoints.

use serde::{Deserialize, Serialize};

/// Upper bound on items per page.
pub const MAX_PER_PAGE: u32 = 200;

/// Request parameters for paginated queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (1-indexed).
    #[serde(default = "default_page")]
    pub page: u32,
    /// Number of items per page.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    50
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    /// Builds a request from optional query parameters, clamping out-of-range values.
    #[must_use]
    pub fn from_query(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or_else(default_page).max(1),
            per_page: per_page
                .unwrap_or_else(default_per_page)
                .clamp(1, MAX_PER_PAGE),
        }
    }

    /// Calculates the offset for database queries.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    /// Returns the limit for database queries.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

/// Response wrapper for paginated data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    /// The items in the current page.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PageMeta,
}

/// Pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items across all pages.
    pub total: u64,
    /// Total number of pages.
    pub total_pages: u64,
}

impl<T> PageResponse<T> {
    /// Creates a new paginated response.
    #[must_use]
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let total_pages = if total == 0 {
            1
        } else {
            total.div_ceil(request.limit().max(1))
        };

        Self {
            data,
            meta: PageMeta {
                page: request.page,
                per_page: request.per_page,
                total,
                total_pages,
            },
        }
    }

    /// Maps the page items, keeping the metadata.
    #[must_use]
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PageResponse<U> {
        PageResponse {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_page_request_default() {
        let request = PageRequest::default();
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, 50);
    }

    #[rstest]
    #[case(1, 20, 0)]
    #[case(2, 20, 20)]
    #[case(5, 50, 200)]
    #[case(0, 50, 0)]
    fn test_page_request_offset(#[case] page: u32, #[case] per_page: u32, #[case] expected: u64) {
        let request = PageRequest { page, per_page };
        assert_eq!(request.offset(), expected);
    }

    #[test]
    fn test_from_query_clamps() {
        let request = PageRequest::from_query(Some(0), Some(10_000));
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, MAX_PER_PAGE);

        let request = PageRequest::from_query(None, Some(0));
        assert_eq!(request.per_page, 1);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(20, 1)]
    #[case(21, 2)]
    #[case(100, 5)]
    fn test_total_pages(#[case] total: u64, #[case] expected: u64) {
        let request = PageRequest {
            page: 1,
            per_page: 20,
        };
        let response: PageResponse<u8> = PageResponse::new(vec![], request, total);
        assert_eq!(response.meta.total_pages, expected);
    }

    #[test]
    fn test_map_keeps_meta() {
        let response = PageResponse::new(vec![1, 2, 3], PageRequest::default(), 3);
        let mapped = response.map(|n| n * 10);
        assert_eq!(mapped.data, vec![10, 20, 30]);
        assert_eq!(mapped.meta.total, 3);
    }
}

//! Offset/limit pagination types for list endpoints.

use serde::{Deserialize, Serialize};

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    /// Maximum number of items to return.
    pub limit: Option<i64>,
    /// Number of items to skip.
    pub offset: Option<i64>,
}

impl PageParams {
    /// Effective limit, clamped into `[1, MAX_PAGE_SIZE]`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Effective offset, floored at zero.
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            limit: None,
            offset: None,
        }
    }
}

/// A page of results with the total count for the underlying query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: i64, params: PageParams) -> Self {
        Self {
            data,
            total,
            limit: params.limit(),
            offset: params.offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = PageParams::default();
        assert_eq!(params.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_limit_clamped_to_max() {
        let params = PageParams {
            limit: Some(10_000),
            offset: None,
        };
        assert_eq!(params.limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_limit_floored_at_one() {
        let params = PageParams {
            limit: Some(0),
            offset: None,
        };
        assert_eq!(params.limit(), 1);
    }

    #[test]
    fn test_negative_offset_floored() {
        let params = PageParams {
            limit: None,
            offset: Some(-5),
        };
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_page_construction() {
        let params = PageParams {
            limit: Some(2),
            offset: Some(4),
        };
        let page = Page::new(vec![1, 2], 10, params);
        assert_eq!(page.data, vec![1, 2]);
        assert_eq!(page.total, 10);
        assert_eq!(page.limit, 2);
        assert_eq!(page.offset, 4);
    }

    #[test]
    fn test_page_serialization() {
        let page = Page::new(vec!["a"], 1, PageParams::default());
        let json = serde_json::to_string(&page).unwrap();
        assert!(json.contains("\"data\""));
        assert!(json.contains("\"total\":1"));
    }
}

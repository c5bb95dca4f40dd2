//! Page-based pagination for list endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// Page number, starting at 1.
    #[param(minimum = 1, default = 1)]
    #[serde(default = "first_page")]
    pub page: i64,

    /// Items per page, at most 100.
    #[param(minimum = 1, maximum = 100, default = 20)]
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn first_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: first_page(),
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageParams {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self { page, per_page }
    }

    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.per_page()
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        PageMeta::new(self.page(), self.per_page(), total)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PageMeta {
    #[schema(example = 1)]
    pub page: i64,
    #[schema(example = 20)]
    pub per_page: i64,
    #[schema(example = 42)]
    pub total: i64,
    #[schema(example = 3)]
    pub total_pages: i64,
    pub has_next: bool,
}

impl PageMeta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = ((total + per_page - 1) / per_page).max(1);
        Self {
            page,
            per_page,
            total,
            total_pages,
            has_next: page < total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = PageParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), DEFAULT_PER_PAGE);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        assert_eq!(PageParams::new(0, 20).page(), 1);
        assert_eq!(PageParams::new(-3, 20).page(), 1);
        assert_eq!(PageParams::new(1, 1000).per_page(), MAX_PER_PAGE);
        assert_eq!(PageParams::new(1, 0).per_page(), 1);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageParams::new(2, 20).offset(), 20);
        assert_eq!(PageParams::new(4, 10).offset(), 30);
    }

    #[test]
    fn test_meta() {
        let meta = PageParams::new(1, 20).meta(41);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);

        let meta = PageParams::new(3, 20).meta(41);
        assert!(!meta.has_next);

        let empty = PageParams::default().meta(0);
        assert_eq!(empty.total_pages, 1);
        assert!(!empty.has_next);
    }

    #[test]
    fn test_query_defaults_when_missing() {
        let params: PageParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, DEFAULT_PER_PAGE);
    }
}

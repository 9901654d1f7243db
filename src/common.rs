use serde::{Deserialize, Serialize};

/// Envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: bool,
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE: i64 = 100_000;

/// `(page, limit)` from raw query values: page in `1..=MAX_PAGE`, limit in `1..=MAX_PAGE_SIZE`.
pub fn resolve_page(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1).min(MAX_PAGE);
    let limit = limit
        .filter(|l| *l > 0)
        .unwrap_or(default_limit)
        .clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

impl PageQuery {
    pub fn resolve(&self, default_limit: i64) -> (i64, i64) {
        resolve_page(self.page, self.limit, default_limit)
    }
}

/// Offset pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub current_page: i64,
    pub per_page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub next_page: Option<i64>,
    pub previous_page: Option<i64>,
}

impl Pagination {
    pub fn new(current_page: i64, per_page: i64, total_items: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total_items + per_page - 1) / per_page
        } else {
            0
        };
        let has_next_page = current_page < total_pages;
        let has_previous_page = current_page > 1;
        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
            has_next_page,
            has_previous_page,
            next_page: has_next_page.then_some(current_page + 1),
            previous_page: has_previous_page.then_some(current_page - 1),
        }
    }

    pub fn offset(&self) -> i64 {
        self.current_page
            .saturating_sub(1)
            .max(0)
            .saturating_mul(self.per_page.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_middle_page() {
        let p = Pagination::new(2, 10, 35);
        assert_eq!(p.total_pages, 4);
        assert!(p.has_next_page);
        assert!(p.has_previous_page);
        assert_eq!(p.next_page, Some(3));
        assert_eq!(p.previous_page, Some(1));
        assert_eq!(p.offset(), 10);
    }

    #[test]
    fn pagination_empty_result() {
        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
        assert!(!p.has_previous_page);
        assert_eq!(p.next_page, None);
    }

    #[test]
    fn page_query_defaults_and_caps() {
        let q = PageQuery { page: None, limit: None };
        assert_eq!(q.resolve(10), (1, 10));

        let q = PageQuery { page: Some(0), limit: Some(500) };
        assert_eq!(q.resolve(10), (1, 100));
    }

    #[test]
    fn huge_page_is_capped_before_offset() {
        let q = PageQuery { page: Some(i64::MAX), limit: Some(10) };
        let (page, limit) = q.resolve(10);
        assert_eq!(page, MAX_PAGE);
        let p = Pagination::new(page, limit, 5);
        assert_eq!(p.offset(), (MAX_PAGE - 1) * 10);
        assert!(!p.has_next_page);
    }

    #[test]
    fn offset_never_overflows() {
        assert_eq!(Pagination::new(i64::MAX, 100, 0).offset(), i64::MAX);
        assert_eq!(Pagination::new(i64::MIN, 10, 0).offset(), 0);
    }
}

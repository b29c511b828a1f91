//! Page requests and the pagination metadata returned by list endpoints.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;
/// Highest page whose offset still fits a signed 64-bit skip.
pub const MAX_PAGE: u64 = i64::MAX.cast_unsigned() / MAX_PAGE_SIZE + 1;

/// A 1-based page number and a page size in `1..=MAX_PAGE_SIZE`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Clamps out of range values instead of rejecting them.
    #[must_use]
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            page_size: match page_size {
                0 => DEFAULT_PAGE_SIZE,
                size => size.min(MAX_PAGE_SIZE),
            },
        }
    }

    /// Builds a request from raw query values.
    ///
    /// Missing, unparsable or non-positive values use the defaults, page sizes
    /// above [`MAX_PAGE_SIZE`] are clamped.
    #[must_use]
    pub fn parse(page: Option<&str>, page_size: Option<&str>) -> Self {
        let positive = |value: Option<&str>| {
            value
                .and_then(|value| value.trim().parse::<i64>().ok())
                .and_then(|value| u64::try_from(value).ok())
                .filter(|value| *value > 0)
        };

        Self::new(
            positive(page).unwrap_or(1),
            positive(page_size).unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    #[must_use]
    pub fn page(self) -> u64 {
        self.page
    }

    #[must_use]
    pub fn page_size(self) -> u64 {
        self.page_size
    }

    #[must_use]
    pub fn skip(self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

/// One page of results together with the number of matches across all pages.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub struct Pagination {
    pub current_page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    #[must_use]
    pub fn new(request: PageRequest, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(request.page_size);

        Self {
            current_page: request.page,
            page_size: request.page_size,
            total_items,
            total_pages,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::pagination::{
        DEFAULT_PAGE_SIZE, MAX_PAGE, MAX_PAGE_SIZE, PageRequest, Pagination,
    };

    #[test]
    fn parse_defaults() {
        assert_eq!(PageRequest::parse(None, None), PageRequest::default());
        assert_eq!(
            PageRequest::parse(Some("abc"), Some("")),
            PageRequest::new(1, DEFAULT_PAGE_SIZE)
        );
        assert_eq!(
            PageRequest::parse(Some("0"), Some("-5")),
            PageRequest::new(1, DEFAULT_PAGE_SIZE)
        );
        assert_eq!(PageRequest::parse(Some("-3"), Some("0")).page(), 1);
    }

    #[test]
    fn parse_clamps_page_size() {
        let request = PageRequest::parse(Some("3"), Some("500"));
        assert_eq!(request.page(), 3);
        assert_eq!(request.page_size(), MAX_PAGE_SIZE);

        assert_eq!(PageRequest::parse(None, Some("100")).page_size(), 100);
        assert_eq!(PageRequest::parse(None, Some("1")).page_size(), 1);
    }

    #[test]
    fn skip() {
        assert_eq!(PageRequest::new(1, 20).skip(), 0);
        assert_eq!(PageRequest::new(2, 10).skip(), 10);
        assert_eq!(PageRequest::new(5, 7).skip(), 28);
    }

    #[test]
    fn huge_pages_keep_a_signed_skip() {
        let request = PageRequest::parse(Some("1000000000000000000"), Some("100"));
        assert_eq!(request.page(), MAX_PAGE);
        assert!(i64::try_from(request.skip()).is_ok());

        let request = PageRequest::new(u64::MAX, u64::MAX);
        assert_eq!(request.page_size(), MAX_PAGE_SIZE);
        assert!(i64::try_from(request.skip()).is_ok());

        let pagination = Pagination::new(request, 10);
        assert!(!pagination.has_next);
        assert!(pagination.has_prev);
    }

    #[test]
    fn second_of_three_pages() {
        let pagination = Pagination::new(PageRequest::new(2, 10), 25);

        assert_eq!(
            pagination,
            Pagination {
                current_page: 2,
                page_size: 10,
                total_items: 25,
                total_pages: 3,
                has_next: true,
                has_prev: true,
            }
        );
    }

    #[test]
    fn total_pages_is_ceiling() {
        for page_size in 1..=MAX_PAGE_SIZE {
            for total_items in [0, 1, 19, 20, 21, 99, 100, 101, 1000] {
                for page in 1..=4 {
                    let pagination =
                        Pagination::new(PageRequest::new(page, page_size), total_items);

                    let expected = (total_items + page_size - 1) / page_size;
                    assert_eq!(pagination.total_pages, expected);
                    assert_eq!(pagination.has_next, page < expected);
                    assert_eq!(pagination.has_prev, page > 1);
                }
            }
        }
    }

    #[test]
    fn empty_listing() {
        let pagination = Pagination::new(PageRequest::default(), 0);
        assert_eq!(pagination.total_pages, 0);
        assert!(!pagination.has_next);
        assert!(!pagination.has_prev);
    }
}

//! Query building blocks shared by the repository and service layers.
//!
//! - [`image`] holds the composable filter expression used for every image
//!   listing, so the visibility predicate is always applied in SQL.
//! - [`PageRequest`] / [`Page`] carry 0-based pagination in and out.

mod image;

pub use image::{ImageQuery, ImageQueryExpr, ImageQueryKind};

use serde::Serialize;

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page a listing endpoint will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
    Null,
}

impl From<Option<i64>> for SqlParam {
    fn from(value: Option<i64>) -> Self {
        value.map(SqlParam::Int).unwrap_or(SqlParam::Null)
    }
}

/// A 0-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Builds a page request from optional query parameters.
    ///
    /// Returns `Err` with a human readable message when `size` is outside
    /// `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, size: Option<u32>) -> Result<Self, String> {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(format!("size must be between 1 and {MAX_PAGE_SIZE}"));
        }

        Ok(Self {
            page: page.unwrap_or(0),
            size,
        })
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    pub fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = request.size.max(1) as u64;

        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: total_elements.div_ceil(size),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Page, PageRequest};

    #[test]
    fn test_page_request_bounds() {
        assert_eq!(
            PageRequest { page: 0, size: 20 },
            PageRequest::new(None, None).unwrap()
        );
        assert!(PageRequest::new(Some(1), Some(0)).is_err());
        assert!(PageRequest::new(Some(1), Some(101)).is_err());

        let request = PageRequest::new(Some(3), Some(10)).unwrap();
        assert_eq!(30, request.offset());
        assert_eq!(10, request.limit());
    }

    #[test]
    fn test_total_pages() {
        let request = PageRequest::new(Some(0), Some(10)).unwrap();

        assert_eq!(0, Page::<u8>::new(vec![], request, 0).total_pages);
        assert_eq!(1, Page::<u8>::new(vec![], request, 10).total_pages);
        assert_eq!(3, Page::<u8>::new(vec![], request, 21).total_pages);
    }
}

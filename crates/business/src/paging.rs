//! Paging
//!
//! Page requests, result pages, and a restartable cursor that pulls pages
//! lazily from any [`PageSource`].

use crate::error::EngineResult;
use async_trait::async_trait;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 200;

/// 1-based page number and page size
///
/// Fields are private so every request goes through [`PageRequest::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Page numbers start at 1; limit is clamped to `1..=MAX_PAGE_LIMIT`
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn first(limit: u32) -> Self {
        Self::new(1, limit)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Limit to query with: one extra row tells whether another page exists
    pub(crate) fn fetch_limit(&self) -> u32 {
        self.limit + 1
    }

    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_LIMIT)
    }
}

/// One page of results
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Build from rows fetched with [`PageRequest::fetch_limit`]
    pub(crate) fn from_overfetch(mut items: Vec<T>, request: PageRequest) -> Self {
        let has_more = items.len() > request.limit as usize;
        items.truncate(request.limit as usize);
        Self {
            items,
            page: request.page,
            limit: request.limit,
            has_more,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

}

/// Anything that can serve numbered pages
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, request: PageRequest) -> EngineResult<Page<Self::Item>>;
}

/// Lazy cursor over a [`PageSource`]
///
/// Nothing is fetched until [`Cursor::next_page`] is called, and
/// [`Cursor::rewind`] starts over from the first page.
pub struct Cursor<S> {
    source: S,
    limit: u32,
    next: Option<PageRequest>,
}

impl<S: PageSource> Cursor<S> {
    pub fn new(source: S, limit: u32) -> Self {
        let first = PageRequest::first(limit);
        Self {
            source,
            limit: first.limit,
            next: Some(first),
        }
    }

    /// Fetch the next page, `None` once the source is exhausted
    pub async fn next_page(&mut self) -> EngineResult<Option<Vec<S::Item>>> {
        let Some(request) = self.next else {
            return Ok(None);
        };

        let page = self.source.fetch_page(request).await?;
        self.next = page.has_more.then(|| request.next());

        if page.is_empty() {
            self.next = None;
            return Ok(None);
        }
        Ok(Some(page.items))
    }

    pub fn rewind(&mut self) {
        self.next = Some(PageRequest::first(self.limit));
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Drain every remaining page
    pub async fn collect_remaining(&mut self) -> EngineResult<Vec<S::Item>> {
        let mut all = Vec::new();
        while let Some(items) = self.next_page().await? {
            all.extend(items);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Numbers {
        count: u32,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl PageSource for Numbers {
        type Item = u32;

        async fn fetch_page(&self, request: PageRequest) -> EngineResult<Page<u32>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let start = request.offset() as u32;
            let end = (start + request.fetch_limit()).min(self.count);
            Ok(Page::from_overfetch((start..end).collect(), request))
        }
    }

    fn numbers(count: u32) -> Numbers {
        Numbers {
            count,
            fetches: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_page_request_normalizes() {
        let request = PageRequest::new(0, 0);
        assert_eq!((request.page(), request.limit()), (1, 1));
        assert_eq!(request.offset(), 0);
        assert_eq!(request.fetch_limit(), 2);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
        assert_eq!(PageRequest::new(1, 10_000).limit(), MAX_PAGE_LIMIT);
        assert_eq!(PageRequest::new(u32::MAX, 5).next().page(), u32::MAX);
    }

    #[test]
    fn test_zero_limit_page_terminates() {
        // A clamped limit of 1 still lets a single row finish the walk
        let request = PageRequest::new(1, 0);
        let page = Page::from_overfetch(vec![7], request);
        assert_eq!(page.items, vec![7]);
        assert!(!page.has_more);
    }

    #[test]
    fn test_from_overfetch_detects_more() {
        let page = Page::from_overfetch(vec![1, 2, 3], PageRequest::first(2));
        assert_eq!(page.items, vec![1, 2]);
        assert!(page.has_more);

        let page = Page::from_overfetch(vec![1, 2], PageRequest::first(2));
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_cursor_is_lazy_and_restartable() {
        let mut cursor = Cursor::new(numbers(5), 2);
        assert_eq!(cursor.source.fetches.load(Ordering::SeqCst), 0);

        assert_eq!(cursor.next_page().await.unwrap(), Some(vec![0, 1]));
        assert_eq!(cursor.next_page().await.unwrap(), Some(vec![2, 3]));
        assert_eq!(cursor.next_page().await.unwrap(), Some(vec![4]));
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.next_page().await.unwrap(), None);
        assert_eq!(cursor.source.fetches.load(Ordering::SeqCst), 3);

        cursor.rewind();
        assert_eq!(cursor.collect_remaining().await.unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cursor_on_empty_source() {
        let mut cursor = Cursor::new(numbers(0), 10);
        assert_eq!(cursor.next_page().await.unwrap(), None);
        assert!(cursor.is_exhausted());
    }
}

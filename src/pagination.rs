//! Render-time pagination over an article pool.
//!
//! Slicing never touches the pool itself; a [`PageReport`] is built per
//! request and discarded after output.

use crate::models::{Article, ArticleFeed};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One page of a pool, with the numbers needed to render page links.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a> {
    /// Page actually shown, after clamping.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub articles: &'a [Article],
}

/// Slice `pool` into page `page` of `page_size` articles.
///
/// # Arguments
///
/// * `pool` - The deduplicated article pool
/// * `page` - Requested page, 1-based; clamped to `[1, total_pages]`
/// * `page_size` - Articles per page; 0 is treated as 1
///
/// # Returns
///
/// A [`Page`] borrowing its articles from `pool`. An empty pool has a
/// single empty page.
///
/// # Examples
///
/// ```ignore
/// let page = paginate(&pool, 99, 9); // pool holds 20 articles
/// assert_eq!(page.page, 3);
/// assert_eq!(page.total_pages, 3);
/// assert_eq!(page.articles.len(), 2);
/// ```
pub fn paginate(pool: &[Article], page: usize, page_size: usize) -> Page<'_> {
    let page_size = page_size.max(1);
    let total_items = pool.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let offset = (page - 1) * page_size;
    let end = (offset + page_size).min(total_items);

    Page {
        page,
        page_size,
        total_pages,
        articles: &pool[offset..end],
    }
}

/// Serialised output of one run: a page plus the feed's diagnostics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport<'a> {
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_count: usize,
    pub fallback_used: bool,
    pub warning: Option<&'a str>,
    pub from_cache: bool,
    pub generated_at: DateTime<Utc>,
    pub articles: &'a [Article],
}

impl<'a> PageReport<'a> {
    pub fn new(feed: &'a ArticleFeed, page: usize, page_size: usize) -> Self {
        let view = paginate(&feed.articles, page, page_size);
        Self {
            page: view.page,
            page_size: view.page_size,
            total_pages: view.total_pages,
            total_count: feed.total_count,
            fallback_used: feed.fallback_used,
            warning: feed.warning.as_deref(),
            from_cache: feed.from_cache,
            generated_at: feed.generated_at,
            articles: view.articles,
        }
    }
}

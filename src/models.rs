//! Data models for search results, cached pools and the feed handed to callers.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Article`]: One search hit as returned by the news API
//! - [`SearchResponse`]: The `/v2/everything` response body
//! - [`CacheEnvelope`]: The record persisted by the cache layer
//! - [`ArticleFeed`]: What presentation code receives from the cache layer
//!
//! Field names on the wire are camelCase to match the news API and the cache
//! file layout, so the structs use `#[serde(rename_all = "camelCase")]`.

use crate::api::FetchResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The outlet an article was published by.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ArticleSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A single article as returned by the news search API.
///
/// Every field is optional at the boundary; missing keys deserialize to
/// `None` instead of failing the whole page. Fields this crate does not
/// read are kept in `extra` so cached records round-trip unchanged.
///
/// The `url` is the identity of an article: the pool builder drops
/// articles without one and keeps only the first article per URL.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub source: Option<ArticleSource>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Article {
    /// The article URL, if present and non-blank.
    ///
    /// # Returns
    ///
    /// `None` for a missing, empty or whitespace-only `url`, so callers can
    /// use it directly as the dedup key.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Text searched by keyword matching: `title + " " + description + " " + content`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let a = Article { title: Some("Banjir".into()), content: Some("Jakarta".into()), ..Default::default() };
    /// assert_eq!(a.searchable_text(), "Banjir  Jakarta");
    /// ```
    pub fn searchable_text(&self) -> String {
        format!(
            "{} {} {}",
            self.title.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default(),
            self.content.as_deref().unwrap_or_default()
        )
    }
}

/// Body of a `/v2/everything` response.
///
/// Only `status == "ok"` bodies contribute articles.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub status: String,
    #[serde(default)]
    pub total_results: Option<u64>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

impl SearchResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Persisted cache record.
///
/// Written whole through a temp file and rename; a reader sees either the
/// previous envelope or the new one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEnvelope {
    pub status: String,
    pub total_results: usize,
    pub articles: Vec<Article>,
    pub warning: Option<String>,
    pub fallback_used: bool,
    pub generated_at: DateTime<Utc>,
}

/// The result handed to presentation code by [`crate::cache::FeedCache`].
#[derive(Debug, Clone)]
pub struct ArticleFeed {
    /// Deduplicated pool, at most `max_pool` long.
    pub articles: Vec<Article>,
    /// Whether the global keyword search contributed (or was attempted).
    pub fallback_used: bool,
    /// Warning text for the reader; suffixed with "(from cache)" on replays.
    pub warning: Option<String>,
    pub total_count: usize,
    pub from_cache: bool,
    pub generated_at: DateTime<Utc>,
    /// Last failed primary-phase call of a live rebuild, for diagnostics.
    pub probe: Option<FetchResult>,
}

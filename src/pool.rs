//! Article pool assembly.
//!
//! A pool is built in two phases, strictly one after the other:
//!
//! 1. **Primary**: page through a domain-scoped search. A plan restriction
//!    stops the phase at once; transient failures skip to the next page.
//!    Articles matching a configured keyword are moved ahead of the rest.
//! 2. **Fallback**: page through a global keyword search when the primary
//!    phase produced fewer than [`FALLBACK_THRESHOLD`] articles or failed.
//!
//! The combined list is then cut down to distinct URLs, first occurrence
//! wins, at most `max_pool` long. Calls are sequential; nothing here is
//! raised as an error, failures end up in [`PoolOutcome::warnings`] and
//! [`PoolOutcome::fallback_used`].

use crate::api::{
    FetchResult, HttpFetch, STATUS_UPGRADE_REQUIRED, domain_search_url, keyword_search_url,
};
use crate::config::PoolConfig;
use crate::models::Article;
use crate::utils::redact_secret;
use itertools::Itertools;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Below this many primary articles the fallback search always runs.
pub const FALLBACK_THRESHOLD: usize = 20;

/// Everything a pool build produces.
#[derive(Debug, Clone, Default)]
pub struct PoolOutcome {
    /// Distinct-URL articles, primary before fallback, at most `max_pool`.
    pub pool: Vec<Article>,
    /// Last failed primary call, if any primary call failed.
    pub probe: Option<FetchResult>,
    pub fallback_used: bool,
    /// Reader-facing warnings in the order they arose, without repeats.
    pub warnings: Vec<String>,
}

#[derive(Debug, Default)]
struct PrimaryPhase {
    candidates: Vec<Article>,
    probe: Option<FetchResult>,
    errored: bool,
    blocked_by_plan: bool,
}

/// Builds article pools through an [`HttpFetch`] implementation.
#[derive(Debug)]
pub struct PoolBuilder<F> {
    fetcher: F,
    config: PoolConfig,
}

impl<F: HttpFetch> PoolBuilder<F> {
    pub fn new(fetcher: F, config: PoolConfig) -> Self {
        Self { fetcher, config }
    }

    /// Run both phases and assemble the pool.
    #[instrument(level = "info", skip_all, fields(domain = %self.config.domain))]
    pub async fn build(&self) -> PoolOutcome {
        let t0 = Instant::now();
        let mut warnings = Vec::new();

        let primary = self.fetch_primary(&mut warnings).await;
        let primary_count = primary.candidates.len();

        let mut fallback_used = false;
        let mut working = if primary.candidates.is_empty() {
            fallback_used = primary.errored || primary.blocked_by_plan;
            Vec::new()
        } else {
            prioritize_by_keywords(primary.candidates, &self.config.keywords)
        };

        if working.len() < FALLBACK_THRESHOLD || primary.errored {
            fallback_used = true;
            self.fetch_fallback(&mut working, primary.blocked_by_plan, &mut warnings)
                .await;
        }

        let pool = dedupe_pool(working, self.config.max_pool);
        info!(
            primary_count,
            pool_size = pool.len(),
            fallback_used,
            blocked_by_plan = primary.blocked_by_plan,
            warnings = warnings.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Built article pool"
        );

        PoolOutcome {
            pool,
            probe: primary.probe,
            fallback_used,
            warnings,
        }
    }

    /// One request, with the API key masked out of any error text so it
    /// cannot reach warnings, logs or the cache.
    async fn fetch(&self, url: &str) -> FetchResult {
        let mut result = self.fetcher.fetch(url).await;
        if let Some(error) = result.error.as_mut() {
            *error = redact_secret(error, &self.config.api_key);
        }
        result
    }

    async fn fetch_primary(&self, warnings: &mut Vec<String>) -> PrimaryPhase {
        let cfg = &self.config;
        let mut phase = PrimaryPhase::default();

        for page in 1..=cfg.max_pages_primary {
            if phase.candidates.len() >= cfg.max_pool {
                break;
            }
            let url = domain_search_url(&cfg.base_url, &cfg.api_key, &cfg.domain, page, cfg.per_request);
            let result = self.fetch(&url).await;

            if !result.ok {
                phase.errored = true;
                if result.is_plan_restriction() {
                    let reason = result.error.clone().unwrap_or_default();
                    warn!(page, status = result.http_status, error = %reason, "Domain search blocked by plan");
                    push_warning(
                        warnings,
                        format!(
                            "Search restricted to {} is not available ({reason}); using global search instead",
                            cfg.domain
                        ),
                    );
                    phase.blocked_by_plan = true;
                    phase.probe = Some(result);
                    break;
                }
                debug!(page, status = result.http_status, "Primary page failed; trying next page");
                phase.probe = Some(result);
                continue;
            }

            match decode_articles(&result) {
                Some(articles) if articles.is_empty() => {
                    debug!(page, "Primary search exhausted");
                    break;
                }
                Some(articles) => {
                    debug!(page, count = articles.len(), "Primary page fetched");
                    phase.candidates.extend(articles);
                }
                None => {
                    phase.errored = true;
                }
            }
        }
        phase
    }

    async fn fetch_fallback(
        &self,
        working: &mut Vec<Article>,
        domain_first: bool,
        warnings: &mut Vec<String>,
    ) {
        let cfg = &self.config;

        for page in 1..=cfg.max_pages_fallback {
            if working.len() >= cfg.max_pool {
                break;
            }
            let url = keyword_search_url(
                &cfg.base_url,
                &cfg.api_key,
                &cfg.fallback_query,
                &cfg.fallback_language,
                page,
                cfg.per_request,
            );
            let result = self.fetch(&url).await;

            if !result.ok && result.http_status == STATUS_UPGRADE_REQUIRED {
                // Keyword search itself is not on the plan; nothing to report.
                info!(page, "Global search not available on this plan");
                break;
            }

            let articles = if result.ok { decode_articles(&result) } else { None };
            let Some(articles) = articles else {
                let reason = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unexpected response".to_string());
                warn!(page, status = result.http_status, error = %reason, "Global search failed");
                if page == 1 {
                    push_warning(warnings, format!("Global search failed: {reason}"));
                }
                break;
            };

            if articles.is_empty() {
                debug!(page, "Global search exhausted");
                break;
            }
            debug!(page, count = articles.len(), "Fallback page fetched");

            if domain_first {
                let (own, others) = partition_by_domain(articles, &cfg.domain);
                working.extend(own);
                working.extend(others);
            } else {
                working.extend(articles);
            }
        }
    }
}

/// Articles of a successful `status == "ok"` response, or `None` when the
/// body is not a usable search response.
fn decode_articles(result: &FetchResult) -> Option<Vec<Article>> {
    match result.search_response()? {
        Ok(response) if response.is_ok() => Some(response.articles),
        Ok(response) => {
            warn!(status = %response.status, "Search response not ok");
            None
        }
        Err(e) => {
            warn!(error = %e, "Could not decode search response");
            None
        }
    }
}

fn push_warning(warnings: &mut Vec<String>, warning: String) {
    if !warnings.contains(&warning) {
        warnings.push(warning);
    }
}

/// Whether any keyword occurs in the article text, ignoring case.
pub fn matches_keywords(article: &Article, keywords: &[String]) -> bool {
    let text = article.searchable_text().to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| text.contains(&k.to_lowercase()))
}

/// Keyword hits first, then the rest; relative order kept within each group.
///
/// # Arguments
///
/// * `articles` - One phase's results in API order
/// * `keywords` - Case-insensitive terms; empty strings never match
pub fn prioritize_by_keywords(articles: Vec<Article>, keywords: &[String]) -> Vec<Article> {
    let (mut matched, unmatched): (Vec<_>, Vec<_>) = articles
        .into_iter()
        .partition(|a| matches_keywords(a, keywords));
    matched.extend(unmatched);
    matched
}

/// Split into articles whose URL contains `domain` and all others.
pub fn partition_by_domain(articles: Vec<Article>, domain: &str) -> (Vec<Article>, Vec<Article>) {
    let domain = domain.to_lowercase();
    articles.into_iter().partition(|a| {
        a.url()
            .map(|u| u.to_lowercase().contains(&domain))
            .unwrap_or(false)
    })
}

/// Reduce a candidate list to the final pool.
///
/// # Arguments
///
/// * `articles` - Candidates in priority order (primary results first)
/// * `max_pool` - Upper bound on the pool length
///
/// # Returns
///
/// The first article for each URL, in the original order, at most
/// `max_pool` long. Articles without a URL are dropped.
///
/// # Examples
///
/// ```ignore
/// let pool = dedupe_pool(vec![a1.clone(), b, a1_again], 10);
/// assert_eq!(pool.len(), 2); // a1 wins over a1_again
/// ```
pub fn dedupe_pool(articles: Vec<Article>, max_pool: usize) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|a| a.url().is_some())
        .unique_by(|a| a.url().unwrap_or_default().to_string())
        .take(max_pool)
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted [`HttpFetch`] used by the pool and cache tests.

    use crate::api::{FetchResult, HttpFetch};
    use crate::models::Article;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use url::Url;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Phase {
        Primary,
        Fallback,
    }

    /// Replies by (phase, page); unscripted pages return an empty `ok` page.
    #[derive(Debug, Default)]
    pub struct ScriptedFetch {
        replies: Mutex<HashMap<(Phase, u32), FetchResult>>,
        calls: Mutex<Vec<(Phase, u32)>>,
    }

    impl ScriptedFetch {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(&self, phase: Phase, page: u32, result: FetchResult) -> &Self {
            self.replies.lock().unwrap().insert((phase, page), result);
            self
        }

        pub fn clear(&self) {
            self.replies.lock().unwrap().clear();
        }

        pub fn calls(&self) -> Vec<(Phase, u32)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl HttpFetch for ScriptedFetch {
        async fn fetch(&self, url: &str) -> FetchResult {
            let parsed = Url::parse(url).unwrap();
            let param = |name: &str| {
                parsed
                    .query_pairs()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.into_owned())
            };
            let phase = if param("domains").is_some() {
                Phase::Primary
            } else {
                Phase::Fallback
            };
            let page: u32 = param("page").unwrap().parse().unwrap();
            self.calls.lock().unwrap().push((phase, page));

            self.replies
                .lock()
                .unwrap()
                .get(&(phase, page))
                .cloned()
                .unwrap_or_else(|| ok_page(&[]))
        }
    }

    pub fn article(url: &str, title: &str) -> Article {
        Article {
            url: Some(url.to_string()),
            title: Some(title.to_string()),
            published_at: Some("2025-05-06T08:00:00Z".to_string()),
            ..Default::default()
        }
    }

    /// `n` plain articles under `prefix`, e.g. `https://detik.com/p/0..n`.
    pub fn articles(prefix: &str, n: usize) -> Vec<Article> {
        (0..n)
            .map(|i| article(&format!("{prefix}/{i}"), &format!("Berita {i}")))
            .collect()
    }

    pub fn ok_page(articles: &[Article]) -> FetchResult {
        let body = serde_json::json!({
            "status": "ok",
            "totalResults": articles.len(),
            "articles": articles,
        });
        FetchResult::success(200, body.to_string())
    }
}

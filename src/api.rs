//! News search API access.
//!
//! This module owns the single outbound request primitive used by the pool
//! builder. Every call is reduced to a [`FetchResult`]: transport failures,
//! timeouts and non-2xx statuses all become `ok == false` values rather than
//! errors, so callers decide per strategy whether to skip, fall back or stop.
//!
//! # Architecture
//!
//! - [`HttpFetch`]: trait defining one GET request
//! - [`ReqwestFetch`]: production implementation with a bounded timeout
//! - URL builders for the two `/v2/everything` query shapes
//!
//! There are no retries at this layer.

use crate::error::Result;
use crate::models::SearchResponse;
use crate::utils::{redact_api_key, truncate_for_log};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// HTTP status the news API returns when the current plan does not allow a request.
pub const STATUS_UPGRADE_REQUIRED: u16 = 426;

/// Outcome of one GET request.
///
/// `body` is present iff `ok`; `error` is present iff `!ok`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub ok: bool,
    /// Observed HTTP status, or 0 when no response arrived.
    pub http_status: u16,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl FetchResult {
    pub fn success(http_status: u16, body: String) -> Self {
        Self {
            ok: true,
            http_status,
            body: Some(body),
            error: None,
        }
    }

    pub fn failure(http_status: u16, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            http_status,
            body: None,
            error: Some(error.into()),
        }
    }

    /// Whether the failure means the plan does not support the request,
    /// as opposed to a transient problem.
    ///
    /// True for HTTP 426, or when an HTTP error response mentions a domain
    /// or parameter restriction. Transport failures (status 0) never are.
    pub fn is_plan_restriction(&self) -> bool {
        if self.ok || self.http_status == 0 {
            return false;
        }
        if self.http_status == STATUS_UPGRADE_REQUIRED {
            return true;
        }
        let text = self.error.as_deref().unwrap_or_default().to_lowercase();
        text.contains("domain") || text.contains("param")
    }

    /// Decode the body as a search response.
    pub fn search_response(&self) -> Option<std::result::Result<SearchResponse, serde_json::Error>> {
        self.body.as_deref().map(serde_json::from_str)
    }
}

/// Trait for issuing one GET request.
///
/// Implementors must never panic or return early on failure; every outcome
/// is a [`FetchResult`].
pub trait HttpFetch {
    /// Fetch `url`, which must already be fully encoded.
    async fn fetch(&self, url: &str) -> FetchResult;
}

impl<T: HttpFetch> HttpFetch for std::sync::Arc<T> {
    async fn fetch(&self, url: &str) -> FetchResult {
        (**self).fetch(url).await
    }
}

/// [`HttpFetch`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    /// Build a fetcher whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetch {
    #[instrument(level = "debug", skip_all, fields(url = %redact_api_key(url)))]
    async fn fetch(&self, url: &str) -> FetchResult {
        let t0 = Instant::now();
        let result = match self.client.get(url).send().await {
            Err(e) => {
                let status = e.status().map(|s| s.as_u16()).unwrap_or(0);
                FetchResult::failure(status, transport_error_message(e))
            }
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text().await {
                    Err(e) => FetchResult::failure(status, transport_error_message(e)),
                    Ok(body) if (200..300).contains(&status) => FetchResult::success(status, body),
                    Ok(body) => FetchResult::failure(status, http_error_message(status, &body)),
                }
            }
        };
        let dt = t0.elapsed();

        if result.ok {
            debug!(
                status = result.http_status,
                elapsed_ms = dt.as_millis() as u64,
                "Request succeeded"
            );
        } else {
            warn!(
                status = result.http_status,
                elapsed_ms = dt.as_millis() as u64,
                error = %result.error.as_deref().unwrap_or_default(),
                "Request failed"
            );
        }
        result
    }
}

/// Describe a reqwest failure without the request URL.
///
/// reqwest's `Display` appends the full URL, query string and API key
/// included. The text here is the error kind plus the underlying cause,
/// so it is safe for logs, warnings and the cache file.
///
/// # Arguments
///
/// * `e` - The error returned by `send()` or while reading the body
///
/// # Returns
///
/// A short message such as `"connection failed: client error (Connect)"`.
pub fn transport_error_message(e: reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "request timed out"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_body() || e.is_decode() {
        "failed reading response body"
    } else {
        "request failed"
    };
    let e = e.without_url();
    match std::error::Error::source(&e) {
        Some(cause) => format!("{kind}: {cause}"),
        None => kind.to_string(),
    }
}

/// Error body the news API sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Human-readable reason for a non-2xx response.
///
/// Uses the API's `code` and `message` when the body is a JSON error object,
/// otherwise just the status.
pub fn http_error_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody { code, message }) => {
            let detail = [code, message]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(": ");
            if detail.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {}", truncate_for_log(&detail, 300))
            }
        }
        Err(_) => format!("HTTP {status}"),
    }
}

/// URL of a domain-scoped search, newest first.
pub fn domain_search_url(
    base_url: &str,
    api_key: &str,
    domain: &str,
    page: u32,
    page_size: u32,
) -> String {
    format!(
        "{}/v2/everything?domains={}&sortBy=publishedAt&page={}&pageSize={}&apiKey={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(domain),
        page,
        page_size,
        urlencoding::encode(api_key)
    )
}

/// URL of a global keyword search in `language`, newest first.
pub fn keyword_search_url(
    base_url: &str,
    api_key: &str,
    query: &str,
    language: &str,
    page: u32,
    page_size: u32,
) -> String {
    format!(
        "{}/v2/everything?q={}&language={}&sortBy=publishedAt&page={}&pageSize={}&apiKey={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(query),
        urlencoding::encode(language),
        page,
        page_size,
        urlencoding::encode(api_key)
    )
}

#[cfg(test)]
mod tests {
    use super::testing::{Reply, serve};
    use super::*;

    #[test]
    fn test_domain_search_url_shape() {
        let url = domain_search_url("https://newsapi.org/", "k3y", "detik.com", 2, 50);
        assert_eq!(
            url,
            "https://newsapi.org/v2/everything?domains=detik.com&sortBy=publishedAt&page=2&pageSize=50&apiKey=k3y"
        );
    }

    #[test]
    fn test_keyword_search_url_encodes_query() {
        let url = keyword_search_url("https://newsapi.org", "k", "cuaca OR banjir", "id", 1, 20);
        assert!(url.contains("q=cuaca%20OR%20banjir"));
        assert!(url.contains("&language=id&sortBy=publishedAt&page=1&pageSize=20&apiKey=k"));
    }

    #[test]
    fn test_plan_restriction_by_status() {
        let r = FetchResult::failure(426, "HTTP 426");
        assert!(r.is_plan_restriction());
    }

    #[test]
    fn test_plan_restriction_by_error_text() {
        let r = FetchResult::failure(400, "HTTP 400: parameterInvalid: bad input");
        assert!(r.is_plan_restriction());
        let r = FetchResult::failure(400, "HTTP 400: Domains not supported on this plan");
        assert!(r.is_plan_restriction());
    }

    #[test]
    fn test_transient_failures_are_not_plan_restrictions() {
        assert!(!FetchResult::failure(500, "HTTP 500").is_plan_restriction());
        assert!(!FetchResult::failure(0, "operation timed out").is_plan_restriction());
        assert!(!FetchResult::success(200, "{}".to_string()).is_plan_restriction());
    }

    #[test]
    fn test_transport_failure_text_never_counts_as_plan_restriction() {
        let r = FetchResult::failure(0, "error sending request for url (https://n.test/v2/everything?domains=detik.com)");
        assert!(!r.is_plan_restriction());
    }

    #[test]
    fn test_http_error_message_uses_api_fields() {
        let body = r#"{"status":"error","code":"parametersMissing","message":"Required parameters are missing."}"#;
        assert_eq!(
            http_error_message(400, body),
            "HTTP 400: parametersMissing: Required parameters are missing."
        );
    }

    #[test]
    fn test_http_error_message_without_json_body() {
        assert_eq!(http_error_message(502, "<html>Bad gateway</html>"), "HTTP 502");
        assert_eq!(http_error_message(503, "{}"), "HTTP 503");
    }

    #[test]
    fn test_search_response_only_for_success() {
        let ok = FetchResult::success(200, r#"{"status":"ok","articles":[]}"#.to_string());
        assert!(ok.search_response().unwrap().unwrap().is_ok());
        assert!(FetchResult::failure(500, "HTTP 500").search_response().is_none());
    }

    fn closed_port() -> u16 {
        // Grab a free port, then close it so the connection is refused.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        port
    }

    #[tokio::test]
    async fn test_reqwest_fetch_reports_transport_failure() {
        let port = closed_port();
        let fetcher = ReqwestFetch::new(Duration::from_secs(2)).unwrap();
        let result = fetcher.fetch(&format!("http://127.0.0.1:{port}/v2/everything")).await;

        assert!(!result.ok);
        assert_eq!(result.http_status, 0);
        assert!(result.body.is_none());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_refused_domain_search_is_transient_and_hides_url() {
        let port = closed_port();
        let url = domain_search_url(
            &format!("http://127.0.0.1:{port}"),
            "SECRET_KEY_123",
            "detik.com",
            1,
            30,
        );
        let fetcher = ReqwestFetch::new(Duration::from_secs(2)).unwrap();
        let result = fetcher.fetch(&url).await;

        assert!(!result.ok);
        assert!(!result.is_plan_restriction());
        let error = result.error.unwrap();
        assert!(!error.contains("SECRET_KEY_123"), "{error}");
        assert!(!error.contains("domains="), "{error}");
    }

    #[tokio::test]
    async fn test_reqwest_fetch_keeps_body_on_success() {
        let base = serve(|_| Reply::Status(200, r#"{"status":"ok","articles":[]}"#.to_string())).await;
        let fetcher = ReqwestFetch::new(Duration::from_secs(5)).unwrap();

        let result = fetcher.fetch(&format!("{base}/v2/everything?q=x")).await;

        assert!(result.ok);
        assert_eq!(result.http_status, 200);
        assert_eq!(result.body.as_deref(), Some(r#"{"status":"ok","articles":[]}"#));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_reqwest_fetch_drops_body_on_server_error() {
        let base = serve(|_| {
            Reply::Status(
                500,
                r#"{"status":"error","code":"unexpectedError","message":"boom"}"#.to_string(),
            )
        })
        .await;
        let fetcher = ReqwestFetch::new(Duration::from_secs(5)).unwrap();

        let result = fetcher.fetch(&format!("{base}/v2/everything?q=x")).await;

        assert!(!result.ok);
        assert_eq!(result.http_status, 500);
        assert!(result.body.is_none());
        assert_eq!(result.error.as_deref(), Some("HTTP 500: unexpectedError: boom"));
        assert!(!result.is_plan_restriction());
    }

    #[tokio::test]
    async fn test_reqwest_fetch_reports_upgrade_required() {
        let base = serve(|_| {
            Reply::Status(
                426,
                r#"{"status":"error","code":"parameterInvalid","message":"You are trying to request results too far in the past."}"#
                    .to_string(),
            )
        })
        .await;
        let fetcher = ReqwestFetch::new(Duration::from_secs(5)).unwrap();
        let url = domain_search_url(&base, "k", "detik.com", 1, 30);

        let result = fetcher.fetch(&url).await;

        assert!(!result.ok);
        assert_eq!(result.http_status, 426);
        assert!(result.body.is_none());
        assert!(result.error.as_deref().unwrap().starts_with("HTTP 426: parameterInvalid"));
        assert!(result.is_plan_restriction());
    }

    #[tokio::test]
    async fn test_reqwest_fetch_hangup_is_transport_failure() {
        let base = serve(|_| Reply::Hangup).await;
        let fetcher = ReqwestFetch::new(Duration::from_secs(5)).unwrap();
        let url = domain_search_url(&base, "SECRET_KEY_123", "detik.com", 1, 30);

        let result = fetcher.fetch(&url).await;

        assert!(!result.ok);
        assert_eq!(result.http_status, 0);
        assert!(!result.is_plan_restriction());
        assert!(!result.error.unwrap().contains("SECRET_KEY_123"));
    }
}

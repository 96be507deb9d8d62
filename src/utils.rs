//! Utility functions for log output and file system checks.
//!
//! - String truncation for logging
//! - API key redaction so request URLs can be logged safely
//! - Writable-directory probe for the cache location

use crate::error::Result;
use rand::{Rng, rng};
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Query parameter carrying the news API key.
const API_KEY_PARAM: &str = "apiKey";

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Replace the `apiKey` query value in `url` with `***`.
///
/// # Arguments
///
/// * `url` - A fully built request URL
///
/// # Returns
///
/// The URL with its key masked. Strings that do not parse as URLs, or that
/// carry no `apiKey` parameter, are returned unchanged.
///
/// # Examples
///
/// ```ignore
/// let url = "https://newsapi.org/v2/everything?q=banjir&apiKey=abc";
/// assert_eq!(redact_api_key(url), "https://newsapi.org/v2/everything?q=banjir&apiKey=***");
/// ```
pub fn redact_api_key(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.query_pairs().any(|(k, _)| k == API_KEY_PARAM) {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == API_KEY_PARAM { "***".into() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

/// Mask every occurrence of `secret` in free-form text, raw or URL-encoded.
///
/// Used on error text before it reaches logs, warnings or the cache file.
/// A blank secret leaves the text unchanged.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(redact_secret("bad key abc", "abc"), "bad key ***");
/// ```
pub fn redact_secret(text: &str, secret: &str) -> String {
    if secret.trim().is_empty() {
        return text.to_string();
    }
    let encoded = urlencoding::encode(secret);
    let text = text.replace(secret, "***");
    if &*encoded != secret {
        text.replace(&*encoded, "***")
    } else {
        text
    }
}

/// Random hex suffix for temporary file names.
pub fn random_suffix() -> String {
    format!("{:016x}", rng().random::<u64>())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    // std fs keeps the error surface simple for a one-off probe
    let probe_path = path.join(format!(".probe_write_{}", random_suffix()));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Cache directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        // 'é' is two bytes; cutting at 3 would split the second one.
        let result = truncate_for_log("éééé", 3);
        assert!(result.starts_with('é'));
        assert!(result.contains("…(+6 bytes)"));
    }

    #[test]
    fn test_redact_secret_masks_raw_and_encoded_key() {
        let text = "failed for https://n.test/?apiKey=a%2Fb and a/b";
        assert_eq!(redact_secret(text, "a/b"), "failed for https://n.test/?apiKey=*** and ***");
        assert_eq!(redact_secret("no key here", ""), "no key here");
    }

    #[test]
    fn test_redact_api_key() {
        let url = "https://newsapi.org/v2/everything?q=banjir&page=1&apiKey=secret123";
        let redacted = redact_api_key(url);
        assert!(!redacted.contains("secret123"));
        assert!(redacted.contains("apiKey=***") || redacted.contains("apiKey=%2A%2A%2A"));
        assert!(redacted.contains("q=banjir"));
    }

    #[test]
    fn test_redact_api_key_leaves_other_urls_alone() {
        let url = "https://newsapi.org/v2/everything?q=banjir";
        assert_eq!(redact_api_key(url), url);
        assert_eq!(redact_api_key("not a url"), "not a url");
    }

    #[test]
    fn test_random_suffix_is_hex() {
        let s = random_suffix();
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }
}

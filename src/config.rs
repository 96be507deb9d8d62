//! Runtime configuration for the pool builder and cache.
//!
//! [`PoolConfig`] is resolved once at startup and passed by reference to
//! everything that needs it. Each field is taken from the command line (or
//! its environment variable), then from the optional YAML file given with
//! `--config`, then from the defaults below.

use crate::cli::Cli;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";
pub const DEFAULT_PER_REQUEST: u32 = 50;
pub const DEFAULT_MAX_PAGES_PRIMARY: u32 = 3;
pub const DEFAULT_MAX_PAGES_FALLBACK: u32 = 2;
pub const DEFAULT_MAX_POOL: usize = 120;
pub const DEFAULT_FALLBACK_LANGUAGE: &str = "id";
pub const DEFAULT_CACHE_PATH: &str = "./cache/articles.json";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Largest `pageSize` the news API accepts.
pub const MAX_PER_REQUEST: u32 = 100;

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub api_key: String,
    pub base_url: String,
    /// Domain searched in the primary phase, e.g. `detik.com`.
    pub domain: String,
    pub per_request: u32,
    pub max_pages_primary: u32,
    pub max_pages_fallback: u32,
    /// Case-insensitive terms that move primary articles to the front.
    pub keywords: Vec<String>,
    pub fallback_query: String,
    pub fallback_language: String,
    pub max_pool: usize,
    pub cache_path: PathBuf,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
}

/// Shape of the optional YAML config file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub domain: Option<String>,
    pub per_request: Option<u32>,
    pub max_pages_primary: Option<u32>,
    pub max_pages_fallback: Option<u32>,
    pub keywords: Option<Vec<String>>,
    pub fallback_query: Option<String>,
    pub fallback_language: Option<String>,
    pub max_pool: Option<usize>,
    pub cache_path: Option<PathBuf>,
    pub cache_ttl_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Read and parse a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}

impl PoolConfig {
    /// Resolve settings from parsed CLI arguments, loading `--config` if given.
    #[instrument(level = "info", skip_all)]
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                debug!(path = %path, "Loading config file");
                FileConfig::load(Path::new(path))?
            }
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Combine CLI values over file values over defaults, then validate.
    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self> {
        let keywords = cli
            .keywords
            .clone()
            .or(file.keywords)
            .unwrap_or_default()
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        let config = Self {
            api_key: cli.api_key.clone().or(file.api_key).unwrap_or_default(),
            base_url: cli
                .base_url
                .clone()
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            domain: cli.domain.clone().or(file.domain).unwrap_or_default(),
            per_request: cli.per_request.or(file.per_request).unwrap_or(DEFAULT_PER_REQUEST),
            max_pages_primary: cli
                .max_pages_primary
                .or(file.max_pages_primary)
                .unwrap_or(DEFAULT_MAX_PAGES_PRIMARY),
            max_pages_fallback: cli
                .max_pages_fallback
                .or(file.max_pages_fallback)
                .unwrap_or(DEFAULT_MAX_PAGES_FALLBACK),
            keywords,
            fallback_query: cli
                .fallback_query
                .clone()
                .or(file.fallback_query)
                .unwrap_or_default(),
            fallback_language: cli
                .fallback_language
                .clone()
                .or(file.fallback_language)
                .unwrap_or_else(|| DEFAULT_FALLBACK_LANGUAGE.to_string()),
            max_pool: cli.max_pool.or(file.max_pool).unwrap_or(DEFAULT_MAX_POOL),
            cache_path: cli
                .cache_path
                .clone()
                .map(PathBuf::from)
                .or(file.cache_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH)),
            cache_ttl: cli
                .cache_ttl_secs
                .or(file.cache_ttl_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CACHE_TTL),
            request_timeout: cli
                .timeout_secs
                .or(file.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("an API key is required (--api-key or NEWS_API_KEY)".into()));
        }
        if self.domain.trim().is_empty() {
            return Err(Error::Config("a primary domain is required (--domain)".into()));
        }
        if self.fallback_query.trim().is_empty() {
            return Err(Error::Config("a fallback query is required (--fallback-query)".into()));
        }
        if !(1..=MAX_PER_REQUEST).contains(&self.per_request) {
            return Err(Error::Config(format!(
                "per_request must be between 1 and {MAX_PER_REQUEST}, got {}",
                self.per_request
            )));
        }
        if self.max_pool == 0 {
            return Err(Error::Config("max_pool must be at least 1".into()));
        }
        Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base_url {:?}: {e}", self.base_url)))?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config(cache_path: PathBuf) -> PoolConfig {
    PoolConfig {
        api_key: "test-key".to_string(),
        base_url: "https://news.test".to_string(),
        domain: "detik.com".to_string(),
        per_request: 30,
        max_pages_primary: 3,
        max_pages_fallback: 2,
        keywords: vec!["cuaca".to_string(), "Banjir".to_string()],
        fallback_query: "cuaca OR banjir".to_string(),
        fallback_language: DEFAULT_FALLBACK_LANGUAGE.to_string(),
        max_pool: 120,
        cache_path,
        cache_ttl: DEFAULT_CACHE_TTL,
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    }
}

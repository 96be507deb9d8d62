//! Command-line interface definitions for News Pool.
//!
//! Pool settings are optional here so that [`crate::config::PoolConfig`] can
//! fall back to the YAML config file and then to built-in defaults.

use clap::Parser;

/// Command-line arguments for the News Pool application.
///
/// # Examples
///
/// ```sh
/// # First page of the pool, served from cache when fresh
/// news_pool --domain detik.com --fallback-query "cuaca OR banjir" --keywords cuaca,banjir
///
/// # Force a rebuild and write page 2 to a file
/// news_pool -c news_pool.yaml --refresh -p 2 -o ./page-2.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// News API key
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the news API
    #[arg(long)]
    pub base_url: Option<String>,

    /// Domain searched first (e.g. detik.com)
    #[arg(long)]
    pub domain: Option<String>,

    /// Comma-separated keywords that move matching primary articles to the front
    #[arg(long, value_delimiter = ',')]
    pub keywords: Option<Vec<String>>,

    /// Query for the global fallback search
    #[arg(long)]
    pub fallback_query: Option<String>,

    /// Language filter for the global fallback search
    #[arg(long)]
    pub fallback_language: Option<String>,

    /// Articles requested per API call
    #[arg(long)]
    pub per_request: Option<u32>,

    /// Pages fetched from the primary domain search
    #[arg(long)]
    pub max_pages_primary: Option<u32>,

    /// Pages fetched from the global fallback search
    #[arg(long)]
    pub max_pages_fallback: Option<u32>,

    /// Maximum number of distinct articles kept in the pool
    #[arg(long)]
    pub max_pool: Option<usize>,

    /// Path of the JSON cache file
    #[arg(long)]
    pub cache_path: Option<String>,

    /// Seconds a cached pool stays fresh
    #[arg(long)]
    pub cache_ttl_secs: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Ignore and delete the cache before fetching
    #[arg(short, long)]
    pub refresh: bool,

    /// Page of the pool to print (1-based)
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,

    /// Articles per page
    #[arg(long, default_value_t = 9)]
    pub page_size: usize,

    /// Write the page report to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,
}

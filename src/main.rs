//! # News Pool
//!
//! Builds a pool of recent articles from a news search API and serves it
//! from a short-lived file cache, one page at a time.
//!
//! ## Usage
//!
//! ```sh
//! NEWS_API_KEY=... news_pool --domain detik.com --fallback-query "cuaca OR banjir" \
//!     --keywords cuaca,banjir --page 1
//! ```
//!
//! ## Architecture
//!
//! 1. **Cache check**: a pool younger than the TTL is read straight from disk
//! 2. **Primary search**: domain-scoped pages, keyword matches moved first
//! 3. **Fallback search**: global keyword search when the primary is thin or fails
//! 4. **Persist**: the deduplicated pool is written atomically to the cache
//! 5. **Output**: the requested page is printed as JSON

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cache;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pagination;
mod pool;
mod utils;

use api::ReqwestFetch;
use cache::{FeedCache, FileCache};
use cli::Cli;
use config::PoolConfig;
use outputs::json;
use pagination::PageReport;
use pool::PoolBuilder;
use utils::{ensure_writable_dir, truncate_for_log};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_pool starting up");

    let args = Cli::parse();
    debug!(?args.config, refresh = args.refresh, page = args.page, "Parsed CLI arguments");

    let config = match PoolConfig::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Could not resolve configuration");
            return Err(e.into());
        }
    };
    info!(
        domain = %config.domain,
        keywords = config.keywords.len(),
        max_pool = config.max_pool,
        cache_path = %config.cache_path.display(),
        "Configuration resolved"
    );

    // Early check: the cache directory must be writable
    let cache_dir = config
        .cache_path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if let Err(e) = ensure_writable_dir(cache_dir).await {
        error!(
            path = %cache_dir.display(),
            error = %e,
            "Cache directory is not writable (fix perms or choose a different --cache-path)"
        );
        return Err(e.into());
    }

    let fetcher = ReqwestFetch::new(config.request_timeout)?;
    let store = FileCache::new(config.cache_path.clone());
    let ttl = config.cache_ttl;
    let feed_cache = FeedCache::new(PoolBuilder::new(fetcher, config), store, ttl);

    let feed = match feed_cache.get_articles(args.refresh).await {
        Ok(feed) => feed,
        Err(e) => {
            error!(error = %e, "No articles to show");
            return Err(e.into());
        }
    };

    if let Some(warning) = &feed.warning {
        warn!(warning = %warning, "Feed carries a warning");
    }
    if let Some(probe) = &feed.probe {
        debug!(
            status = probe.http_status,
            error = %truncate_for_log(probe.error.as_deref().unwrap_or_default(), 200),
            "Primary search probe"
        );
    }

    let report = PageReport::new(&feed, args.page, args.page_size);
    info!(
        page = report.page,
        total_pages = report.total_pages,
        total_count = report.total_count,
        from_cache = report.from_cache,
        fallback_used = report.fallback_used,
        "Rendering page"
    );

    match &args.output {
        Some(path) => json::write_report(&report, Path::new(path)).await?,
        None => json::write_stdout(&report).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

//! Time-boxed file cache in front of the pool builder.
//!
//! [`FileCache`] stores one [`CacheEnvelope`] per file. Writes go to a
//! temporary file in the same directory which is then renamed over the
//! cache path, so readers only ever see a complete envelope.
//!
//! [`FeedCache`] decides between the two states of that file:
//!
//! - **Fresh** (exists, younger than the TTL, no forced refresh): decode
//!   and return it without touching the network.
//! - **Stale, missing or forced**: run the pool builder and persist the
//!   result, unless the builder came back empty. An empty pool is never
//!   written; the caller gets the stale envelope if one is still on disk,
//!   otherwise [`Error::NoContent`].
//!
//! Rebuilds inside one process are serialised by a mutex, and a waiter
//! re-reads the cache once it gets the lock.

use crate::api::HttpFetch;
use crate::error::{Error, Result};
use crate::models::{ArticleFeed, CacheEnvelope};
use crate::pool::PoolBuilder;
use crate::utils::random_suffix;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Appended to warnings replayed from the cache file.
pub const FROM_CACHE_SUFFIX: &str = " (from cache)";

/// Note added when a stale envelope is served because a rebuild found nothing.
pub const STALE_NOTE: &str = "Refresh returned no articles; showing older cached results";

/// Whether a file modified at `modified` is still fresh at `now`.
///
/// A modification time in the future counts as age zero.
pub fn is_fresh(modified: SystemTime, now: SystemTime, ttl: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age < ttl,
        Err(_) => true,
    }
}

/// An envelope read from disk together with the file's modification time.
#[derive(Debug, Clone)]
pub struct CachedEnvelope {
    pub envelope: CacheEnvelope,
    pub modified: SystemTime,
}

/// A single JSON cache file with atomic replace.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        self.dir().join(format!(".{name}.{}.tmp", random_suffix()))
    }

    /// Read the envelope, or `None` when the file does not exist.
    ///
    /// The modification time is taken from the same open handle the
    /// contents are read from.
    pub async fn get(&self) -> Result<Option<CachedEnvelope>> {
        let mut file = match fs::File::open(&self.path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = file.metadata().await?.modified()?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).await?;
        let envelope = serde_json::from_slice(&contents)?;
        Ok(Some(CachedEnvelope { envelope, modified }))
    }

    /// Replace the cache file with `envelope`.
    pub async fn put(&self, envelope: &CacheEnvelope) -> Result<()> {
        let json = serde_json::to_vec(envelope)?;
        fs::create_dir_all(self.dir()).await?;

        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        debug!(path = %self.path.display(), bytes = json.len(), "Cache file replaced");
        Ok(())
    }

    /// Delete the cache file; a missing file is not an error.
    pub async fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Cache-aware entry point used by presentation code.
#[derive(Debug)]
pub struct FeedCache<F> {
    builder: PoolBuilder<F>,
    store: FileCache,
    ttl: Duration,
    rebuild: Mutex<()>,
}

impl<F: HttpFetch> FeedCache<F> {
    pub fn new(builder: PoolBuilder<F>, store: FileCache, ttl: Duration) -> Self {
        Self {
            builder,
            store,
            ttl,
            rebuild: Mutex::new(()),
        }
    }

    /// Current article pool, from cache when fresh.
    ///
    /// A fresh envelope is returned as is. A stale or missing one triggers
    /// a rebuild, which is persisted only when it found articles.
    ///
    /// # Arguments
    ///
    /// * `force_refresh` - Delete the cache file and rebuild regardless of age
    ///
    /// # Returns
    ///
    /// The feed, with `from_cache` telling whether it was read from disk.
    ///
    /// # Errors
    ///
    /// [`Error::NoContent`] when the rebuild found nothing and no usable
    /// cache exists; I/O errors from removing the file on a forced refresh.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let cache = FeedCache::new(PoolBuilder::new(fetcher, config), store, ttl);
    /// let feed = cache.get_articles(false).await?;
    /// println!("{} articles, fallback: {}", feed.total_count, feed.fallback_used);
    /// ```
    pub async fn get_articles(&self, force_refresh: bool) -> Result<ArticleFeed> {
        self.get_articles_at(force_refresh, SystemTime::now()).await
    }

    /// [`Self::get_articles`] with an explicit clock reading for freshness.
    #[instrument(level = "info", skip_all, fields(force_refresh = force_refresh, path = %self.store.path().display()))]
    pub async fn get_articles_at(&self, force_refresh: bool, now: SystemTime) -> Result<ArticleFeed> {
        let _guard = self.rebuild.lock().await;

        let cached = if force_refresh {
            self.store.remove().await?;
            info!("Forced refresh; cache file removed");
            None
        } else {
            self.read_cache().await
        };

        if let Some(cached) = &cached {
            if is_fresh(cached.modified, now, self.ttl) {
                info!(articles = cached.envelope.articles.len(), "Serving fresh cache");
                return Ok(feed_from_envelope(cached.envelope.clone(), None));
            }
            debug!("Cache is stale");
        }

        let outcome = self.builder.build().await;

        if outcome.pool.is_empty() {
            if let Some(stale) = cached {
                warn!("Rebuild produced no articles; serving stale cache");
                return Ok(feed_from_envelope(stale.envelope, Some(STALE_NOTE)));
            }
            error!("Rebuild produced no articles and no cache is available");
            return Err(Error::NoContent);
        }

        let warning = (!outcome.warnings.is_empty()).then(|| outcome.warnings.join("; "));
        let envelope = CacheEnvelope {
            status: "ok".to_string(),
            total_results: outcome.pool.len(),
            articles: outcome.pool,
            warning,
            fallback_used: outcome.fallback_used,
            generated_at: Utc::now(),
        };

        if let Err(e) = self.store.put(&envelope).await {
            error!(error = %e, "Failed to write cache file; returning live results");
        } else {
            info!(articles = envelope.articles.len(), "Cache file written");
        }

        Ok(ArticleFeed {
            total_count: envelope.articles.len(),
            articles: envelope.articles,
            fallback_used: envelope.fallback_used,
            warning: envelope.warning,
            from_cache: false,
            generated_at: envelope.generated_at,
            probe: outcome.probe,
        })
    }

    async fn read_cache(&self) -> Option<CachedEnvelope> {
        match self.store.get().await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable cache file");
                None
            }
        }
    }
}

fn feed_from_envelope(envelope: CacheEnvelope, note: Option<&str>) -> ArticleFeed {
    let replayed = envelope.warning.map(|w| format!("{w}{FROM_CACHE_SUFFIX}"));
    let warning = match (replayed, note) {
        (Some(w), Some(n)) => Some(format!("{w}; {n}")),
        (w, n) => w.or_else(|| n.map(str::to_string)),
    };
    ArticleFeed {
        total_count: envelope.articles.len(),
        articles: envelope.articles,
        fallback_used: envelope.fallback_used,
        warning,
        from_cache: true,
        generated_at: envelope.generated_at,
        probe: None,
    }
}

//! JSON output of a page report.
//!
//! With no output path the report goes to stdout. With a path, it is
//! written to a sibling temp file and renamed into place, and parent
//! directories are created as needed.

use crate::error::Result;
use crate::pagination::PageReport;
use crate::utils::random_suffix;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

/// Pretty-printed JSON for `report`.
pub fn render(report: &PageReport<'_>) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Print `report` to stdout.
pub async fn write_stdout(report: &PageReport<'_>) -> Result<()> {
    let mut json = render(report)?;
    json.push('\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(json.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Write `report` to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(report: &PageReport<'_>, path: &Path) -> Result<()> {
    let json = render(report)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.json".to_string());
    let temp_path = path.with_file_name(format!(".{file_name}.{}.tmp", random_suffix()));
    fs::write(&temp_path, &json).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    info!(bytes = json.len(), page = report.page, "Wrote page report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, ArticleFeed};
    use chrono::Utc;

    fn feed() -> ArticleFeed {
        ArticleFeed {
            articles: vec![Article {
                url: Some("https://detik.com/1".to_string()),
                title: Some("Cuaca cerah".to_string()),
                ..Default::default()
            }],
            fallback_used: false,
            warning: None,
            total_count: 1,
            from_cache: false,
            generated_at: Utc::now(),
            probe: None,
        }
    }

    #[tokio::test]
    async fn test_write_report_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("page-1.json");
        let feed = feed();
        let report = PageReport::new(&feed, 1, 9);

        write_report(&report, &path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["articles"][0]["title"], "Cuaca cerah");
        assert_eq!(value["page"], 1);
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_render_is_pretty_json() {
        let feed = feed();
        let json = render(&PageReport::new(&feed, 1, 9)).unwrap();
        assert!(json.contains("\n  \"page\": 1"));
    }
}

//! Archive persistence.
//!
//! The archive is one JSON document (the "final" document) rewritten on every
//! run, plus two directories that keep history around it:
//!
//! ```text
//! workspace/astro/
//! ├── public/articles_py.json            # merged archive, newest first
//! ├── data/articles_daily/
//! │   └── 2025-05-06.json                # records built by that day's run
//! └── backups/
//!     └── articles_py_20250506_071500.json  # final document before the run
//! ```
//!
//! The backup is the only recovery mechanism. The final document is written
//! to a temporary sibling and renamed over the old one, so a failed write
//! leaves the previous archive in place.

use crate::models::Record;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Persistence failures. All of them abort the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid archive JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where the archive lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub final_path: PathBuf,
    pub daily_dir: PathBuf,
    pub backup_dir: PathBuf,
}

impl StoreLayout {
    /// Backup file name for a run started at `now`: `{stem}_{YYYYmmdd_HHMMSS}.json`.
    pub fn backup_path(&self, now: DateTime<Local>) -> PathBuf {
        let stem = self
            .final_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("articles");
        self.backup_dir
            .join(format!("{}_{}.json", stem, now.format("%Y%m%d_%H%M%S")))
    }

    /// Snapshot file name for the day of `now`: `{YYYY-MM-DD}.json`.
    pub fn daily_path(&self, now: DateTime<Local>) -> PathBuf {
        self.daily_dir
            .join(format!("{}.json", now.date_naive().format("%Y-%m-%d")))
    }
}

/// Load the current archive. A missing document is an empty archive; an
/// unreadable or malformed one is an error.
#[instrument(level = "info", skip_all, fields(path = %final_path.display()))]
pub async fn load(final_path: &Path) -> Result<Vec<Record>, StoreError> {
    let raw = match fs::read_to_string(final_path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No archive yet; starting empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(StoreError::io(final_path, e)),
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<Record> = serde_json::from_str(&raw).map_err(|source| StoreError::Json {
        path: final_path.to_path_buf(),
        source,
    })?;
    info!(count = records.len(), "Loaded archive");
    Ok(records)
}

/// Copy the current final document verbatim into the backup directory.
///
/// Returns the backup path, or `None` when there was nothing to back up.
#[instrument(level = "info", skip_all)]
pub async fn backup_previous(
    layout: &StoreLayout,
    now: DateTime<Local>,
) -> Result<Option<PathBuf>, StoreError> {
    if !fs::try_exists(&layout.final_path)
        .await
        .map_err(|e| StoreError::io(&layout.final_path, e))?
    {
        return Ok(None);
    }
    fs::create_dir_all(&layout.backup_dir)
        .await
        .map_err(|e| StoreError::io(&layout.backup_dir, e))?;
    let backup = layout.backup_path(now);
    fs::copy(&layout.final_path, &backup)
        .await
        .map_err(|e| StoreError::io(&backup, e))?;
    info!(path = %backup.display(), "Backed up previous archive");
    Ok(Some(backup))
}

/// Write `records` as pretty-printed JSON, replacing `path` atomically.
pub async fn write_json(path: &Path, records: &[Record]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(records).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Persist a run: backup of the old archive, daily snapshot of this run's
/// records, then the merged archive.
#[instrument(level = "info", skip_all, fields(run = run_records.len(), merged = merged.len()))]
pub async fn persist(
    layout: &StoreLayout,
    run_records: &[Record],
    merged: &[Record],
    now: DateTime<Local>,
) -> Result<(), StoreError> {
    backup_previous(layout, now).await?;

    let daily = layout.daily_path(now);
    write_json(&daily, run_records).await?;
    info!(path = %daily.display(), count = run_records.len(), "Wrote daily snapshot");

    write_json(&layout.final_path, merged).await?;
    info!(path = %layout.final_path.display(), count = merged.len(), "Wrote archive");
    Ok(())
}

/// Persist an in-place update of the archive (backup, then final document)
/// without a daily snapshot.
#[instrument(level = "info", skip_all, fields(count = records.len()))]
pub async fn rewrite(
    layout: &StoreLayout,
    records: &[Record],
    now: DateTime<Local>,
) -> Result<(), StoreError> {
    backup_previous(layout, now).await?;
    write_json(&layout.final_path, records).await?;
    info!(path = %layout.final_path.display(), "Rewrote archive");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn layout(dir: &TempDir) -> StoreLayout {
        StoreLayout {
            final_path: dir.path().join("public/articles_py.json"),
            daily_dir: dir.path().join("data/articles_daily"),
            backup_dir: dir.path().join("backups"),
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 5, 6, 7, 15, 0).unwrap()
    }

    fn record(identity: &str) -> Record {
        Record {
            title: "Título".to_string(),
            title_localized: "Título".to_string(),
            identity: identity.to_string(),
            date: "2025-05-06".to_string(),
            source: "CNIO".to_string(),
            content_localized: "Contenido".to_string(),
        }
    }

    #[test]
    fn test_layout_paths() {
        let layout = StoreLayout {
            final_path: PathBuf::from("out/articles_py.json"),
            daily_dir: PathBuf::from("out/daily"),
            backup_dir: PathBuf::from("out/backups"),
        };
        assert_eq!(
            layout.backup_path(now()),
            PathBuf::from("out/backups/articles_py_20250506_071500.json")
        );
        assert_eq!(layout.daily_path(now()), PathBuf::from("out/daily/2025-05-06.json"));
    }

    #[tokio::test]
    async fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let records = load(&layout(&dir).final_path).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("articles.json");
        std::fs::write(&path, "[{not json").unwrap();
        assert!(matches!(load(&path).await, Err(StoreError::Json { .. })));
    }

    #[tokio::test]
    async fn test_first_persist_has_no_backup() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        persist(&layout, &[record("https://a.org/1")], &[record("https://a.org/1")], now())
            .await
            .unwrap();

        assert!(layout.final_path.exists());
        assert!(layout.daily_path(now()).exists());
        assert!(!layout.backup_dir.exists());
    }

    #[tokio::test]
    async fn test_persist_backs_up_previous_verbatim() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        std::fs::create_dir_all(layout.final_path.parent().unwrap()).unwrap();
        let previous = "[\n  {\"title\": \"old\", \"url\": \"https://a.org/0\"}\n]";
        std::fs::write(&layout.final_path, previous).unwrap();

        let run = vec![record("https://a.org/1")];
        let merged = vec![record("https://a.org/1"), record("https://a.org/0")];
        persist(&layout, &run, &merged, now()).await.unwrap();

        let backup = std::fs::read_to_string(layout.backup_path(now())).unwrap();
        assert_eq!(backup, previous);

        let daily: Vec<Record> =
            serde_json::from_str(&std::fs::read_to_string(layout.daily_path(now())).unwrap()).unwrap();
        assert_eq!(daily, run);

        let written = std::fs::read_to_string(&layout.final_path).unwrap();
        assert!(written.contains("\n  {"), "archive is indented");
        assert!(written.contains("Título"), "non-ASCII is not escaped");
        assert_eq!(load(&layout.final_path).await.unwrap(), merged);
    }

    #[tokio::test]
    async fn test_rewrite_skips_daily_snapshot() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        rewrite(&layout, &[record("https://a.org/1")], now()).await.unwrap();
        assert!(layout.final_path.exists());
        assert!(!layout.daily_dir.exists());
    }
}

//! Downloads media rows that are still pending.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::constants::UNKNOWN_EXTENSION;
use crate::crawler::politeness_delay;
use crate::db::{Media, RecordStore};
use crate::media::MediaFetcher;

/// Counts from one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub pending: usize,
    pub downloaded: usize,
    /// Non-2xx responses; left pending.
    pub skipped_status: usize,
    /// Media whose post is missing from the store; left pending.
    pub skipped_orphan: usize,
    /// Transport, filesystem or store errors; left pending.
    pub failed: usize,
}

enum ItemOutcome {
    Downloaded(PathBuf),
    BadStatus(u16),
    MissingPost,
}

/// Turns pending media rows into files under `media_dir`.
pub struct ImageReconciler<F, R> {
    fetcher: F,
    store: R,
    media_dir: PathBuf,
    request_interval: Duration,
}

impl<F: MediaFetcher, R: RecordStore> ImageReconciler<F, R> {
    #[must_use]
    pub fn new(fetcher: F, store: R, media_dir: PathBuf, request_interval: Duration) -> Self {
        Self {
            fetcher,
            store,
            media_dir,
            request_interval,
        }
    }

    /// Download every pending media row once.
    ///
    /// A failing item is logged and left pending; the pass carries on.
    ///
    /// # Errors
    ///
    /// Returns an error if the media directory cannot be created or the
    /// pending rows cannot be listed.
    pub async fn run(&self) -> Result<ReconcileSummary> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create media directory: {}",
                    self.media_dir.display()
                )
            })?;

        let pending = self.store.find_pending_media().await?;
        info!(count = pending.len(), "Started image download");

        let mut summary = ReconcileSummary {
            pending: pending.len(),
            ..ReconcileSummary::default()
        };

        for media in &pending {
            match self.reconcile_one(media).await {
                Ok(ItemOutcome::Downloaded(path)) => {
                    summary.downloaded += 1;
                    debug!(url = %media.url, path = %path.display(), "Downloaded");
                }
                Ok(ItemOutcome::BadStatus(status)) => {
                    summary.skipped_status += 1;
                    error!(url = %media.url, status, "Unexpected response status");
                }
                Ok(ItemOutcome::MissingPost) => {
                    summary.skipped_orphan += 1;
                    error!(media_id = media.id, post_id = media.post_id, "Media references a missing post");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(url = %media.url, "Failed to download media: {e:#}");
                }
            }
        }

        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped_status + summary.skipped_orphan,
            failed = summary.failed,
            "Finished image download"
        );
        Ok(summary)
    }

    async fn reconcile_one(&self, media: &Media) -> Result<ItemOutcome> {
        politeness_delay(self.request_interval).await;
        let response = self.fetcher.get(&media.url).await?;
        if !response.is_success() {
            return Ok(ItemOutcome::BadStatus(response.status));
        }

        let Some(post) = self.store.find_post(media.post_id).await? else {
            return Ok(ItemOutcome::MissingPost);
        };

        // Write before marking: a crash in between leaves the row pending.
        let path = write_new_file(&self.media_dir, post.id, media.ext.as_deref(), &response.body)
            .await?;

        let path_str = path.to_string_lossy();
        if !self.store.mark_media_downloaded(media.id, &path_str).await? {
            warn!(media_id = media.id, "Media was already marked downloaded");
        }

        Ok(ItemOutcome::Downloaded(path))
    }
}

/// File name for the `sequence`-th file of a post.
#[must_use]
pub fn media_filename(post_id: i64, sequence: u32, ext: Option<&str>) -> String {
    format!("{post_id}_{sequence}.{}", ext.unwrap_or(UNKNOWN_EXTENSION))
}

/// Write `body` to the first free `{post_id}_{n}.{ext}` in `dir`, n from 1.
///
/// Existing files are never overwritten.
async fn write_new_file(dir: &Path, post_id: i64, ext: Option<&str>, body: &[u8]) -> Result<PathBuf> {
    let mut sequence = 1;
    loop {
        let path = dir.join(media_filename(post_id, sequence, ext));
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;

        match opened {
            Ok(mut file) => {
                file.write_all(body)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                file.sync_all()
                    .await
                    .with_context(|| format!("Failed to sync {}", path.display()))?;
                return Ok(path);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                sequence += 1;
            }
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .context(format!("Failed to create {}", path.display()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_media_filename() {
        assert_eq!(media_filename(42, 1, Some("jpg")), "42_1.jpg");
        assert_eq!(media_filename(42, 3, Some("png")), "42_3.png");
        assert_eq!(media_filename(7, 1, None), "7_1.unk");
    }

    #[tokio::test]
    async fn test_write_new_file_skips_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("42_1.jpg"), b"first").unwrap();

        let path = write_new_file(dir.path(), 42, Some("jpg"), b"second")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("42_2.jpg"));
        assert_eq!(std::fs::read(dir.path().join("42_1.jpg")).unwrap(), b"first");
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_write_new_file_fills_first_gap() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("9_1.unk"), b"a").unwrap();
        std::fs::write(dir.path().join("9_2.unk"), b"b").unwrap();

        let path = write_new_file(dir.path(), 9, None, b"c").await.unwrap();
        assert_eq!(path, dir.path().join("9_3.unk"));
    }
}

//! The record store interface the crawler and reconciler are written against.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::models::{Author, Media, NewAuthor, NewMedia, NewPost, Post};
use super::queries::{
    get_author, get_pending_media, get_post, insert_author_if_absent, insert_media_if_absent,
    insert_post_if_absent, set_media_downloaded,
};
use super::Database;
use crate::media::media_extension;

/// Key-indexed storage for posts, authors and media.
///
/// Every write is insert-if-absent or a guarded single-row update, so
/// re-running any pass against the same store is safe.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_post(&self, id: i64) -> Result<Option<Post>>;

    async fn find_author(&self, id: i64) -> Result<Option<Author>>;

    /// Store a post together with its author and media rows.
    ///
    /// Rows that already exist are left as they are.
    async fn store_post(&self, post: &NewPost, author: &NewAuthor) -> Result<()>;

    async fn find_pending_media(&self) -> Result<Vec<Media>>;

    /// Flip a pending media row to downloaded. Returns `false` if the row
    /// was already complete.
    async fn mark_media_downloaded(&self, media_id: i64, path: &str) -> Result<bool>;
}

#[async_trait]
impl RecordStore for Database {
    async fn find_post(&self, id: i64) -> Result<Option<Post>> {
        get_post(self.pool(), id).await
    }

    async fn find_author(&self, id: i64) -> Result<Option<Author>> {
        get_author(self.pool(), id).await
    }

    async fn store_post(&self, post: &NewPost, author: &NewAuthor) -> Result<()> {
        if insert_author_if_absent(self.pool(), author).await? {
            debug!(author_id = author.id, username = %author.username, "Stored new author");
        }

        // The post and its media land together or not at all.
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("Failed to begin post transaction")?;

        insert_post_if_absent(&mut *tx, post).await?;
        for url in &post.media_urls {
            let media = NewMedia {
                url: url.clone(),
                post_id: post.id,
                ext: media_extension(url),
            };
            insert_media_if_absent(&mut *tx, &media).await?;
        }

        tx.commit()
            .await
            .context("Failed to commit post transaction")?;
        Ok(())
    }

    async fn find_pending_media(&self) -> Result<Vec<Media>> {
        get_pending_media(self.pool()).await
    }

    async fn mark_media_downloaded(&self, media_id: i64, path: &str) -> Result<bool> {
        set_media_downloaded(self.pool(), media_id, path).await
    }
}

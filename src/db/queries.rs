use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};

use super::models::{
    format_timestamp, Author, Media, NewAuthor, NewMedia, NewPost, Post, StoreStats,
};

// ========== Posts ==========

/// Get a post by its id.
pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by id")
}

/// Insert a post unless one with the same id already exists.
///
/// Returns `true` if a row was inserted.
pub async fn insert_post_if_absent<'e, E>(executor: E, post: &NewPost) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r"
        INSERT INTO posts (id, text, author_id, created_at, crawled_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        ",
    )
    .bind(post.id)
    .bind(&post.text)
    .bind(post.author_id)
    .bind(format_timestamp(&post.created_at))
    .bind(format_timestamp(&post.crawled_at))
    .execute(executor)
    .await
    .context("Failed to insert post")?;

    Ok(result.rows_affected() > 0)
}

// ========== Authors ==========

/// Get an author by id.
pub async fn get_author(pool: &SqlitePool, id: i64) -> Result<Option<Author>> {
    sqlx::query_as("SELECT * FROM authors WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch author by id")
}

/// Insert an author unless one with the same id already exists.
///
/// Existing authors are never updated.
pub async fn insert_author_if_absent(pool: &SqlitePool, author: &NewAuthor) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT INTO authors (id, name, username, protected, crawled_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        ",
    )
    .bind(author.id)
    .bind(&author.name)
    .bind(&author.username)
    .bind(author.protected)
    .bind(format_timestamp(&Utc::now()))
    .execute(pool)
    .await
    .context("Failed to insert author")?;

    Ok(result.rows_affected() > 0)
}

// ========== Media ==========

/// Insert a pending media row unless its URL is already known.
pub async fn insert_media_if_absent<'e, E>(executor: E, media: &NewMedia) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r"
        INSERT INTO media (url, post_id, path, downloaded, ext)
        VALUES (?, ?, NULL, 0, ?)
        ON CONFLICT(url) DO NOTHING
        ",
    )
    .bind(&media.url)
    .bind(media.post_id)
    .bind(&media.ext)
    .execute(executor)
    .await
    .context("Failed to insert media")?;

    Ok(result.rows_affected() > 0)
}

/// Get a media row by its URL.
pub async fn get_media_by_url(pool: &SqlitePool, url: &str) -> Result<Option<Media>> {
    sqlx::query_as("SELECT * FROM media WHERE url = ?")
        .bind(url)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch media by url")
}

/// Get all media rows attached to a post, in insertion order.
pub async fn get_media_for_post(pool: &SqlitePool, post_id: i64) -> Result<Vec<Media>> {
    sqlx::query_as("SELECT * FROM media WHERE post_id = ? ORDER BY id")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch media for post")
}

/// Get every media row that has not been downloaded yet, oldest first.
pub async fn get_pending_media(pool: &SqlitePool) -> Result<Vec<Media>> {
    sqlx::query_as("SELECT * FROM media WHERE downloaded = 0 ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to fetch pending media")
}

/// Mark a pending media row as downloaded to `path`.
///
/// Rows that are already downloaded are left untouched; returns whether
/// the row changed.
pub async fn set_media_downloaded(pool: &SqlitePool, id: i64, path: &str) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE media
        SET downloaded = 1, path = ?
        WHERE id = ? AND downloaded = 0
        ",
    )
    .bind(path)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to mark media downloaded")?;

    Ok(result.rows_affected() > 0)
}

// ========== Stats ==========

/// Count rows in each table.
pub async fn get_store_stats(pool: &SqlitePool) -> Result<StoreStats> {
    let (posts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    let (authors,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM authors")
        .fetch_one(pool)
        .await
        .context("Failed to count authors")?;
    let (media, pending_media): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN downloaded = 0 THEN 1 ELSE 0 END), 0) FROM media",
    )
    .fetch_one(pool)
    .await
    .context("Failed to count media")?;

    Ok(StoreStats {
        posts,
        authors,
        media,
        pending_media,
    })
}

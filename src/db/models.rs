use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format used for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way it is stored in the database.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// A liked post as stored in the `posts` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub author_id: i64,
    pub created_at: String,
    pub crawled_at: String,
}

/// The author of a post, as stored in the `authors` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub protected: bool,
    pub crawled_at: String,
}

/// A media attachment, as stored in the `media` table.
///
/// `path` is set exactly when `downloaded` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: i64,
    pub url: String,
    pub post_id: i64,
    pub path: Option<String>,
    pub downloaded: bool,
    pub ext: Option<String>,
}

/// A post parsed from a page of likes, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub id: i64,
    pub text: String,
    pub author_id: i64,
    /// Canonical media URLs in attachment order.
    pub media_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub crawled_at: DateTime<Utc>,
}

/// Author details as returned by the API or read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuthor {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub protected: bool,
}

impl From<Author> for NewAuthor {
    fn from(author: Author) -> Self {
        Self {
            id: author.id,
            name: author.name,
            username: author.username,
            protected: author.protected,
        }
    }
}

/// A pending media row to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMedia {
    pub url: String,
    pub post_id: i64,
    pub ext: Option<String>,
}

/// Row counts for the status report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub posts: i64,
    pub authors: i64,
    pub media: i64,
    pub pending_media: i64,
}

//! Typed payloads of the users and liked-posts endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::db::NewAuthor;

/// The API encodes 64-bit ids as decimal strings.
fn string_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

/// How to look a user up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(i64),
    Username(String),
}

impl std::fmt::Display for UserLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id {id}"),
            Self::Username(name) => write!(f, "@{name}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    #[serde(deserialize_with = "string_id")]
    pub id: i64,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub protected: bool,
}

impl From<ApiUser> for NewAuthor {
    fn from(user: ApiUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            username: user.username,
            protected: user.protected,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiProblem {
    #[must_use]
    pub fn describe(&self) -> String {
        self.detail
            .clone()
            .or_else(|| self.title.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserResponse {
    pub data: Option<ApiUser>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

/// One page of the liked-posts endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LikedPostsPage {
    #[serde(default)]
    data: Option<Vec<RawPost>>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

impl LikedPostsPage {
    /// Posts on this page, newest first.
    #[must_use]
    pub fn posts(&self) -> &[RawPost] {
        self.data.as_deref().unwrap_or_default()
    }

    /// Expanded media objects referenced by the posts.
    #[must_use]
    pub fn media(&self) -> &[RawMedia] {
        self.includes
            .as_ref()
            .and_then(|i| i.media.as_deref())
            .unwrap_or_default()
    }

    /// Cursor for the next page; `None` on the last page.
    #[must_use]
    pub fn next_token(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.next_token.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    media: Option<Vec<RawMedia>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PageMeta {
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    #[serde(deserialize_with = "string_id")]
    pub id: i64,
    pub text: String,
    #[serde(deserialize_with = "string_id")]
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    attachments: Option<Attachments>,
}

impl RawPost {
    /// Media keys attached to this post, in attachment order.
    #[must_use]
    pub fn media_keys(&self) -> &[String] {
        self.attachments
            .as_ref()
            .and_then(|a| a.media_keys.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Attachments {
    #[serde(default)]
    media_keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMedia {
    pub media_key: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Only photos carry a direct URL.
    #[serde(default)]
    pub url: Option<String>,
}

impl RawMedia {
    #[must_use]
    pub fn is_photo(&self) -> bool {
        self.kind == "photo"
    }
}

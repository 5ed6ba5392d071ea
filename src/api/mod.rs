//! Remote API collaborator: user lookup and paginated liked posts.

mod client;
mod error;
mod types;

pub use client::XApiClient;
pub use error::{ApiError, Result};
pub use types::{ApiProblem, ApiUser, LikedPostsPage, RawMedia, RawPost, UserLookup};

use async_trait::async_trait;

use crate::db::NewAuthor;

/// The remote API as seen by the crawler.
///
/// Implementations handle authentication and rate-limit compliance
/// themselves and may sleep for arbitrarily long before returning.
#[async_trait]
pub trait LikesApi: Send + Sync {
    async fn get_user(&self, lookup: &UserLookup) -> Result<NewAuthor>;

    /// Fetch one page of posts liked by `target`; `None` requests the
    /// newest page.
    async fn get_liked_posts(
        &self,
        target: &NewAuthor,
        pagination_token: Option<&str>,
    ) -> Result<LikedPostsPage>;
}

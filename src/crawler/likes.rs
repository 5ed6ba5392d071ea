use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{CrawlStrategy, ParsedPage, StoreOutcome};
use crate::api::{LikedPostsPage, LikesApi, UserLookup};
use crate::db::{NewAuthor, NewPost, RecordStore};
use crate::media::canonical_media_url;

/// Crawls the posts liked by one account.
pub struct LikesCrawler<A, R> {
    api: A,
    store: R,
    target: NewAuthor,
}

impl<A: LikesApi, R: RecordStore> LikesCrawler<A, R> {
    /// Look up `username` and build a crawler for their likes.
    ///
    /// # Errors
    ///
    /// Returns an error if the user lookup fails.
    pub async fn connect(api: A, store: R, username: &str) -> Result<Self> {
        info!(username, "Initializing crawler");
        let target = api
            .get_user(&UserLookup::Username(username.to_string()))
            .await
            .with_context(|| format!("Failed to look up target user @{username}"))?;
        Ok(Self::new(api, store, target))
    }

    #[must_use]
    pub fn new(api: A, store: R, target: NewAuthor) -> Self {
        Self { api, store, target }
    }

    /// The account whose likes are crawled.
    #[must_use]
    pub fn target(&self) -> &NewAuthor {
        &self.target
    }

    /// Author details from the store, or from the API on a miss.
    async fn resolve_author(&self, author_id: i64) -> Result<NewAuthor> {
        if let Some(author) = self.store.find_author(author_id).await? {
            return Ok(author.into());
        }
        let author = self
            .api
            .get_user(&UserLookup::Id(author_id))
            .await
            .with_context(|| format!("Failed to fetch author {author_id}"))?;
        debug!(author_id, username = %author.username, "Fetched author");
        Ok(author)
    }
}

#[async_trait]
impl<A: LikesApi, R: RecordStore> CrawlStrategy for LikesCrawler<A, R> {
    type Fetched = LikedPostsPage;
    type Item = NewPost;

    async fn fetch(&self, pagination_token: Option<&str>) -> Result<LikedPostsPage> {
        self.api
            .get_liked_posts(&self.target, pagination_token)
            .await
            .context("Failed to fetch liked posts")
    }

    fn parse(&self, fetched: LikedPostsPage) -> Result<ParsedPage<NewPost>> {
        Ok(parse_liked_page(&fetched, Utc::now()))
    }

    async fn store(&self, posts: &[NewPost]) -> Result<StoreOutcome> {
        // Pages come newest first, so a known first post means the rest is known too.
        let Some(first) = posts.first() else {
            return Ok(StoreOutcome::Finished);
        };
        if self.store.find_post(first.id).await?.is_some() {
            debug!(post_id = first.id, "Reached an already stored post");
            return Ok(StoreOutcome::Finished);
        }

        // Oldest first: the page's first post is only present once the whole
        // page is, so an interrupted page is crawled again on the next run.
        for post in posts.iter().rev() {
            let author = self.resolve_author(post.author_id).await?;
            self.store.store_post(post, &author).await?;
            debug!(
                post_id = post.id,
                author = %author.username,
                media = post.media_urls.len(),
                "Stored post"
            );
        }

        Ok(StoreOutcome::Continue)
    }
}

/// Reduce a page of liked posts to storable records.
///
/// Only photo attachments are kept; media keys that do not resolve to a
/// photo on this page are dropped.
#[must_use]
pub fn parse_liked_page(page: &LikedPostsPage, crawled_at: DateTime<Utc>) -> ParsedPage<NewPost> {
    let photo_urls: HashMap<&str, String> = page
        .media()
        .iter()
        .filter(|m| m.is_photo())
        .filter_map(|m| {
            m.url
                .as_deref()
                .map(|url| (m.media_key.as_str(), canonical_media_url(url)))
        })
        .collect();

    let items = page
        .posts()
        .iter()
        .map(|post| NewPost {
            id: post.id,
            text: post.text.clone(),
            author_id: post.author_id,
            media_urls: post
                .media_keys()
                .iter()
                .filter_map(|key| photo_urls.get(key.as_str()).cloned())
                .collect(),
            created_at: post.created_at,
            crawled_at,
        })
        .collect();

    ParsedPage {
        next_token: page.next_token().map(ToString::to_string),
        items,
    }
}

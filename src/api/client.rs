use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::error::{ApiError, Result};
use super::types::{LikedPostsPage, UserLookup, UserResponse};
use super::LikesApi;
use crate::config::Config;
use crate::constants::{RATE_LIMIT_FALLBACK_SECS, USER_AGENT};
use crate::db::NewAuthor;

/// Client for the v2 users and liked-posts endpoints.
#[derive(Debug, Clone)]
pub struct XApiClient {
    client: Client,
    base_url: String,
    bearer_token: String,
    user_access_token: Option<String>,
    page_size: u32,
}

impl XApiClient {
    /// Build a client from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
            user_access_token: config.user_access_token.clone(),
            page_size: config.page_size,
        })
    }

    /// Token to use for requests about `target`.
    fn token_for(&self, target: &NewAuthor) -> &str {
        if target.protected {
            if let Some(token) = &self.user_access_token {
                return token;
            }
            warn!(
                username = %target.username,
                "Target account is protected but USER_ACCESS_TOKEN is not set"
            );
        }
        &self.bearer_token
    }

    /// GET `path` and decode the JSON body, waiting out rate limits.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        loop {
            let response = self
                .client
                .get(&url)
                .bearer_auth(token)
                .query(query)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = rate_limit_wait(&response);
                warn!(path, wait_secs = wait.as_secs(), "Rate limited, waiting for reset");
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }
    }
}

/// How long to sleep after a 429, from the `x-rate-limit-reset` epoch header.
fn rate_limit_wait(response: &Response) -> Duration {
    let reset = response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok());

    match reset {
        Some(reset) => {
            let secs = (reset - Utc::now().timestamp()).max(0).unsigned_abs();
            Duration::from_secs(secs + 1)
        }
        None => Duration::from_secs(RATE_LIMIT_FALLBACK_SECS),
    }
}

#[async_trait]
impl LikesApi for XApiClient {
    async fn get_user(&self, lookup: &UserLookup) -> Result<NewAuthor> {
        let path = match lookup {
            UserLookup::Id(id) => format!("/2/users/{id}"),
            UserLookup::Username(name) => format!("/2/users/by/username/{name}"),
        };
        let query = [("user.fields", "protected,name".to_string())];

        let response: UserResponse = self.get_json(&path, &query, &self.bearer_token).await?;
        match response.data {
            Some(user) => {
                debug!(user_id = user.id, username = %user.username, "Fetched user");
                Ok(user.into())
            }
            None => {
                let detail = response
                    .errors
                    .first()
                    .map_or_else(|| format!("user {lookup}"), super::types::ApiProblem::describe);
                Err(ApiError::NotFound(detail))
            }
        }
    }

    async fn get_liked_posts(
        &self,
        target: &NewAuthor,
        pagination_token: Option<&str>,
    ) -> Result<LikedPostsPage> {
        let path = format!("/2/users/{}/liked_tweets", target.id);
        let mut query = vec![
            ("expansions", "attachments.media_keys".to_string()),
            ("media.fields", "url".to_string()),
            ("tweet.fields", "author_id,created_at".to_string()),
            ("max_results", self.page_size.to_string()),
        ];
        if let Some(token) = pagination_token {
            query.push(("pagination_token", token.to_string()));
        }

        self.get_json(&path, &query, self.token_for(target)).await
    }
}

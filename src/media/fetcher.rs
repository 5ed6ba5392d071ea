use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use crate::constants::USER_AGENT;

/// Raw result of a media GET.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub status: u16,
    pub body: Bytes,
}

impl FetchedMedia {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can download the bytes behind a URL.
///
/// Non-2xx responses are returned as data, not errors; only transport
/// failures are `Err`.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedMedia>;
}

/// [`MediaFetcher`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: Client,
}

impl HttpMediaFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn get(&self, url: &str) -> Result<FetchedMedia> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {url}"))?;

        Ok(FetchedMedia { status, body })
    }
}

// src/services/fetcher.rs

//! Announcement page fetcher.
//!
//! Fetches one page per item through the shared [`RateLimiter`], checks the
//! status and extracts the page title.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{FetchConfig, FetchResult, Item, ItemId, Locale};
use crate::services::RateLimiter;
use crate::utils::http::{create_async_client, extract_title};

/// Source of page contents for the batch runner.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one item. Fails with [`AppError::Cancelled`] once `cancel` fires.
    async fn fetch(&self, item: &Item, cancel: &CancellationToken) -> Result<FetchResult>;
}

/// Builds page URLs of the form `<base>/<locale>/resource/pages/announcement/<id>`.
#[derive(Debug, Clone)]
pub struct Endpoint {
    base: Url,
    locale: Locale,
}

impl Endpoint {
    pub fn new(base_url: &str, locale: Locale) -> Result<Self> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(AppError::config(format!("'{base_url}' cannot be a base URL")));
        }
        Ok(Self { base, locale })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::new(&config.base_url, config.locale)
    }

    /// Page URL for an item ID.
    pub fn url_for(&self, id: &ItemId) -> String {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                self.locale.path_segment(),
                "resource",
                "pages",
                "announcement",
                id.as_str(),
            ]);
        }
        url.to_string()
    }

    /// Resolve an ID into a monitored item.
    pub fn item(&self, id: ItemId) -> Item {
        let url = self.url_for(&id);
        Item { id, url }
    }
}

/// HTTP implementation of [`PageFetcher`].
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl HttpFetcher {
    /// Create a fetcher sharing `limiter` with every other fetcher of the batch.
    pub fn new(config: &FetchConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            limiter,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, item: &Item, cancel: &CancellationToken) -> Result<FetchResult> {
        self.limiter.acquire(cancel).await?;

        log::debug!(
            "Fetching {} (id={}, qps={})",
            item.url,
            item.id,
            self.limiter.qps()
        );

        let content = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = self.download(&item.url) => result?,
        };

        let title = extract_title(&content)?;
        log::debug!(
            "Fetched {} bytes for {} (title={:?})",
            content.len(),
            item.id,
            title
        );

        Ok(FetchResult {
            item: item.clone(),
            content,
            title,
        })
    }
}

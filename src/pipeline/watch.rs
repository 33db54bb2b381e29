// src/pipeline/watch.rs

//! Wiring of the engine from a [`Config`].

use std::sync::Arc;

use crate::error::Result;
use crate::models::{BatchReport, Config, ItemId};
use crate::pipeline::{BatchOptions, BatchRunner, ProgressHook, comparator_for};
use crate::services::{Endpoint, HttpFetcher, RateLimiter};
use crate::storage::LocalBaselineStore;

/// Fully assembled change-detection engine.
pub struct Watcher {
    endpoint: Endpoint,
    runner: BatchRunner,
}

impl Watcher {
    /// Validate `config` and build every component from it.
    ///
    /// Fails if the storage root cannot be created.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(
            LocalBaselineStore::open(&config.storage.root, config.storage.mode.suffix()).await?,
        );
        let limiter = Arc::new(RateLimiter::new(config.fetch.qps)?);
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch, limiter)?);
        let comparator = comparator_for(config.storage.mode, store);

        log::debug!(
            "Engine ready: base_url={}, locale={:?}, qps={}, storage={}, mode={:?}",
            config.fetch.base_url,
            config.fetch.locale,
            config.fetch.qps,
            config.storage.root.display(),
            config.storage.mode
        );

        Ok(Self {
            endpoint: Endpoint::from_config(&config.fetch)?,
            runner: BatchRunner::new(fetcher, comparator, BatchOptions::from(&config.batch)),
        })
    }

    /// Report each finished item to `hook`.
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.runner = self.runner.with_progress(hook);
        self
    }

    /// Fetch and compare every ID once.
    pub async fn run(&self, ids: Vec<ItemId>) -> BatchReport {
        let items = ids.into_iter().map(|id| self.endpoint.item(id)).collect();
        self.runner.run(items).await
    }
}

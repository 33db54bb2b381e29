// src/pipeline/batch.rs

//! Batch orchestration.
//!
//! Fans a set of items out to one task each, bounded by a semaphore and a
//! batch-wide deadline, and folds the per-item outcomes into a
//! [`BatchReport`] through a single collector task.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{BatchConfig, BatchReport, DiffRecord, Item, ItemFailure, ItemId};
use crate::pipeline::Comparator;
use crate::services::PageFetcher;

/// Final state of one item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Changed(DiffRecord),
    Unchanged(ItemId),
    Failed(ItemFailure),
}

impl ItemOutcome {
    pub fn id(&self) -> &ItemId {
        match self {
            ItemOutcome::Changed(record) => &record.id,
            ItemOutcome::Unchanged(id) => id,
            ItemOutcome::Failed(failure) => &failure.id,
        }
    }
}

/// Callback invoked once per finished item, from the collector task.
pub type ProgressHook = Arc<dyn Fn(&ItemOutcome) + Send + Sync>;

/// Limits applied to one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Time after which unfinished items are cancelled
    pub deadline: Duration,
    /// Maximum number of items in flight
    pub max_concurrent: usize,
}

impl From<&BatchConfig> for BatchOptions {
    fn from(config: &BatchConfig) -> Self {
        Self {
            deadline: config.deadline(),
            max_concurrent: config.max_concurrent,
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from(&BatchConfig::default())
    }
}

/// Runs fetch-and-compare over a batch of items.
pub struct BatchRunner {
    fetcher: Arc<dyn PageFetcher>,
    comparator: Arc<dyn Comparator>,
    options: BatchOptions,
    progress: Option<ProgressHook>,
}

impl BatchRunner {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        comparator: Arc<dyn Comparator>,
        options: BatchOptions,
    ) -> Self {
        Self {
            fetcher,
            comparator,
            options,
            progress: None,
        }
    }

    /// Report each finished item to `hook`.
    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    /// Process every unique item and collect the changes.
    ///
    /// Never fails as a whole: item errors end up in `BatchReport::failures`,
    /// and items still pending at the deadline are reported as cancelled.
    pub async fn run(&self, items: Vec<Item>) -> BatchReport {
        let started_at = Utc::now();

        let mut seen = HashSet::new();
        let items: Vec<Item> = items
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .collect();
        let total = items.len();

        log::info!(
            "Processing {} item(s), max {} in flight, deadline {:?}",
            total,
            self.options.max_concurrent,
            self.options.deadline
        );

        let cancel = CancellationToken::new();
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent.max(1)));
        let (tx, rx) = mpsc::channel::<ItemOutcome>(total.clamp(1, 1024));
        let collector = tokio::spawn(collect(rx, self.progress.clone()));

        let mut tasks = JoinSet::new();
        for item in items {
            let fetcher = Arc::clone(&self.fetcher);
            let comparator = Arc::clone(&self.comparator);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let tx = tx.clone();

            tasks.spawn(async move {
                let result =
                    process_item(&item, fetcher.as_ref(), comparator.as_ref(), &semaphore, &cancel)
                        .await;
                let outcome = match result {
                    Ok(Some(record)) => ItemOutcome::Changed(record),
                    Ok(None) => {
                        log::debug!("No diff for {}", item.id);
                        ItemOutcome::Unchanged(item.id)
                    }
                    Err(error) => {
                        log::error!("Failed to process {} ({}): {}", item.id, item.url, error);
                        ItemOutcome::Failed(ItemFailure {
                            kind: error.kind(),
                            message: error.to_string(),
                            id: item.id,
                        })
                    }
                };
                // The collector outlives every producer.
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        let deadline = tokio::time::sleep(self.options.deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline, if !cancel.is_cancelled() => {
                    log::warn!(
                        "Batch deadline of {:?} reached, cancelling {} pending item(s)",
                        self.options.deadline,
                        tasks.len()
                    );
                    cancel.cancel();
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(error)) => log::error!("Item task aborted: {}", error),
                    None => break,
                },
            }
        }

        let (records, failures) = collector.await.unwrap_or_else(|error| {
            log::error!("Result collector aborted: {}", error);
            (Vec::new(), Vec::new())
        });

        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            total,
            records,
            failures,
        };

        log::info!(
            "Batch done: total={}, diff_count={}, failures={}",
            report.total,
            report.change_count(),
            report.failures.len()
        );
        report
    }
}

/// Fetch and compare one item.
///
/// Cancellation is observed while waiting for a slot and while fetching.
/// Once the page is in hand the comparison runs to completion, so a baseline
/// is never left half-updated.
async fn process_item(
    item: &Item,
    fetcher: &dyn PageFetcher,
    comparator: &dyn Comparator,
    semaphore: &Semaphore,
    cancel: &CancellationToken,
) -> Result<Option<DiffRecord>> {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AppError::Cancelled),
        permit = semaphore.acquire() => permit.map_err(|_| AppError::Cancelled)?,
    };

    let fetched = fetcher.fetch(item, cancel).await?;
    comparator.compare(&fetched).await
}

/// Drain outcomes until every producer is gone.
async fn collect(
    mut rx: mpsc::Receiver<ItemOutcome>,
    progress: Option<ProgressHook>,
) -> (Vec<DiffRecord>, Vec<ItemFailure>) {
    let mut records = Vec::new();
    let mut failures = Vec::new();

    while let Some(outcome) = rx.recv().await {
        if let Some(hook) = &progress {
            hook(&outcome);
        }
        match outcome {
            ItemOutcome::Changed(record) => records.push(record),
            ItemOutcome::Unchanged(_) => {}
            ItemOutcome::Failed(failure) => failures.push(failure),
        }
    }

    (records, failures)
}

//! Bounded-concurrency artifact scheduler
//!
//! Fans one fetch task out per record while a semaphore keeps at most
//! `concurrency_limit` fetches in flight, whatever the record count. Every
//! outcome is collected; one record's failure never cancels another's task.

use crate::error::Error;
use crate::fetcher::ArtifactFetcher;
use crate::types::{AggregateReport, FetchOutcome, Record};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Completions between progress log lines
const PROGRESS_LOG_INTERVAL: usize = 10;

/// Schedules all records' artifact fetches under a concurrency ceiling
pub struct FetchScheduler {
    fetcher: Arc<ArtifactFetcher>,
    concurrency_limit: usize,
    cancel: CancellationToken,
}

impl FetchScheduler {
    /// Create a scheduler over the given fetcher
    pub fn new(
        fetcher: Arc<ArtifactFetcher>,
        concurrency_limit: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            concurrency_limit,
            cancel,
        }
    }

    /// Run every record's fetch task and collect the aggregate report.
    ///
    /// Cancellation stops admission: tasks that have not yet entered their
    /// fetch when the token fires are recorded as `Failed(Cancelled)`
    /// (the report always accounts for every record), while tasks already
    /// fetching finish their current attempt.
    pub async fn run_all(&self, records: &[Record]) -> AggregateReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let total = records.len();
        tracing::info!(
            total,
            concurrency_limit = self.concurrency_limit,
            "starting artifact phase"
        );

        let mut tasks = FuturesUnordered::new();
        for record in records {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let cancel = self.cancel.clone();
            let record = record.clone();
            let id = record.product_id;
            let name = record.name.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (record.product_id, record.name, FetchOutcome::Failed(Error::Cancelled)),
                };
                // Admission gate: a task that has not started fetching when
                // the run is cancelled must not begin a new network call.
                if cancel.is_cancelled() {
                    return (record.product_id, record.name, FetchOutcome::Failed(Error::Cancelled));
                }
                let outcome = fetcher.fetch(&record, &cancel).await;
                (record.product_id, record.name, outcome)
            });

            tasks.push(async move {
                match handle.await {
                    Ok(completed) => completed,
                    Err(e) => (
                        id,
                        name,
                        FetchOutcome::Failed(Error::Other(format!("fetch task aborted: {e}"))),
                    ),
                }
            });
        }

        let mut report = AggregateReport::default();
        let mut done = 0usize;
        while let Some((id, name, outcome)) = tasks.next().await {
            report.record(id, name, outcome);
            done += 1;
            if done % PROGRESS_LOG_INTERVAL == 0 || done == total {
                tracing::info!(done, total, "artifact progress");
            }
        }

        tracing::info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed.len(),
            "artifact phase finished"
        );
        report
    }
}

//! Queue scheduler
//!
//! A pass selects every due email (highest priority first), splits the list
//! round-robin into one partition per worker and dispatches each partition on
//! its own task.
//!
//! ```text
//! [due emails] → partition(N) → [task 1] → Dispatcher → Mailer
//!                             → [task 2] → Dispatcher → Mailer
//!                             → ...
//! ```

use crate::config::QueueConfig;
use crate::error::Result;
use crate::queue::{DispatchOutcome, Dispatcher};
use crate::store::Store;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::ops::AddAssign;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counts of one scheduler pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.sent + self.failed + self.skipped
    }

    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::Failed => self.failed += 1,
            DispatchOutcome::Skipped => self.skipped += 1,
        }
    }
}

impl AddAssign for DispatchSummary {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Split `items` into `parts` round-robin lists: item `i` lands in list `i % parts`
///
/// Always returns exactly `parts` lists, some of which may be empty.
pub fn partition<T>(items: Vec<T>, parts: NonZeroUsize) -> Vec<Vec<T>> {
    let parts = parts.get();
    let mut partitions: Vec<Vec<T>> = (0..parts)
        .map(|_| Vec::with_capacity(items.len() / parts + 1))
        .collect();

    for (index, item) in items.into_iter().enumerate() {
        partitions[index % parts].push(item);
    }

    partitions
}

/// Periodically drains the queue
pub struct Scheduler {
    store: Arc<dyn Store>,
    dispatcher: Arc<Dispatcher>,
    config: QueueConfig,
}

impl Scheduler {
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<Dispatcher>, config: QueueConfig) -> Self {
        Self {
            store,
            dispatcher,
            config,
        }
    }

    /// Release claims left behind by workers that stopped mid-dispatch
    pub async fn recover(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::seconds(self.config.claim_timeout_secs);
        let released = self.store.release_stale_claims(cutoff).await?;
        if released > 0 {
            warn!("Released {} stale claims", released);
        }
        Ok(released)
    }

    /// Dispatch every email due now
    pub async fn run_once(&self) -> Result<DispatchSummary> {
        let due = self
            .store
            .due_emails(Utc::now(), self.config.batch_size)
            .await?;

        if due.is_empty() {
            debug!("No queued emails");
            return Ok(DispatchSummary::default());
        }

        let ids: Vec<i64> = due.iter().map(|email| email.id).collect();
        let partitions = partition(ids, self.config.partitions());
        info!(
            "Dispatching {} emails over {} workers",
            due.len(),
            partitions.len()
        );

        let mut tasks = JoinSet::new();
        for ids in partitions.into_iter().filter(|ids| !ids.is_empty()) {
            let dispatcher = Arc::clone(&self.dispatcher);
            tasks.spawn(async move { dispatch_partition(&dispatcher, ids).await });
        }

        let mut summary = DispatchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(partial) => summary += partial,
                Err(e) => error!("Queue worker stopped: {}", e),
            }
        }

        info!(
            "Queue pass done: {} sent, {} failed, {} skipped",
            summary.sent, summary.failed, summary.skipped
        );
        Ok(summary)
    }

    /// Run passes until `shutdown` is cancelled
    ///
    /// Cancellation is checked between passes; a pass in progress completes.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!("Starting queue scheduler");
        self.recover().await?;

        while !shutdown.is_cancelled() {
            let delay = match self.run_once().await {
                Ok(summary) if summary.total() > 0 => self.config.poll_interval(),
                Ok(_) => self.config.idle_interval(),
                Err(e) => {
                    error!("Queue processing error: {}", e);
                    self.config.error_backoff()
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        info!("Queue scheduler stopped");
        Ok(())
    }
}

/// Dispatch one partition in order; a failing email never stops its siblings
async fn dispatch_partition(dispatcher: &Dispatcher, ids: Vec<i64>) -> DispatchSummary {
    let mut summary = DispatchSummary::default();

    for id in ids {
        match dispatcher.dispatch(id).await {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                error!("Failed to dispatch email {}: {}", id, e);
                summary.failed += 1;
            }
        }
    }

    summary
}

//! Parallel executor using tokio tasks.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::ExecutorConfig;
use super::error::ExecutorError;
use super::report::{ExecutionReport, ItemFailure};

/// Bounded parallel executor.
#[derive(Debug, Clone)]
pub struct ParallelExecutor {
    config: ExecutorConfig,
}

impl ParallelExecutor {
    /// Create a new executor.
    #[must_use]
    pub const fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Worker count for a run over `item_count` items.
    ///
    /// Clamped to `[1, min(max_workers, available_parallelism * 2, item_count)]`.
    #[must_use]
    pub fn effective_workers(&self, item_count: usize) -> usize {
        let hardware = std::thread::available_parallelism()
            .map_or(1, std::num::NonZeroUsize::get)
            .saturating_mul(2);
        self.config
            .max_workers
            .min(hardware)
            .min(item_count)
            .max(1)
    }

    /// Run `work` over every item.
    ///
    /// Returns once every item has produced an outcome, `cancel` fires, or
    /// the deadline elapses. In the latter two cases the report carries the
    /// interruption along with whatever completed first.
    pub async fn run<T, R, E, F, Fut>(
        &self,
        items: Vec<T>,
        work: F,
        cancel: &CancellationToken,
    ) -> ExecutionReport<T, R, E>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let start_time = Instant::now();
        let total = items.len();
        let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
        let mut failures: Vec<ItemFailure<T, E>> = Vec::new();

        if total == 0 {
            return ExecutionReport {
                slots,
                failures,
                interruption: None,
                workers: 0,
                elapsed: start_time.elapsed(),
            };
        }

        let workers = self.effective_workers(total);
        let mut succeeded = 0usize;

        info!(
            "Starting parallel execution: {} items, {} workers",
            total, workers
        );

        let items = Arc::new(items);
        let work = Arc::new(work);
        let next_index = Arc::new(AtomicUsize::new(0));
        let stop = cancel.child_token();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, Result<R, E>)>();

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let items = Arc::clone(&items);
            let work = Arc::clone(&work);
            let next_index = Arc::clone(&next_index);
            let result_tx = result_tx.clone();
            let stop = stop.clone();

            set.spawn(async move {
                loop {
                    if stop.is_cancelled() {
                        break;
                    }
                    let index = next_index.fetch_add(1, Ordering::Relaxed);
                    let Some(item) = items.get(index).cloned() else {
                        break;
                    };
                    let outcome = tokio::select! {
                        biased;
                        () = stop.cancelled() => break,
                        outcome = work(item) => outcome,
                    };
                    if result_tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let deadline = self.config.deadline;
        let deadline_wait = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline_wait);

        let mut interruption = None;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    interruption = Some(ExecutorError::Cancelled);
                    break;
                }
                () = &mut deadline_wait => {
                    interruption = Some(ExecutorError::DeadlineExceeded {
                        seconds: deadline.map_or(0, |d| d.as_secs()),
                    });
                    break;
                }
                received = result_rx.recv() => {
                    let Some((index, outcome)) = received else {
                        break;
                    };
                    if record(&items, &mut slots, &mut failures, index, outcome) {
                        succeeded += 1;
                    }
                    debug!(
                        completed = succeeded + failures.len(),
                        failed = failures.len(),
                        total,
                        "Item finished"
                    );
                }
            }
        }

        if interruption.is_some() {
            stop.cancel();
            set.shutdown().await;
        } else {
            while let Some(joined) = set.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Executor worker terminated abnormally");
                }
            }
        }

        // Keep anything that finished before the stop signal.
        while let Ok((index, outcome)) = result_rx.try_recv() {
            if record(&items, &mut slots, &mut failures, index, outcome) {
                succeeded += 1;
            }
        }

        failures.sort_by_key(|f| f.index);
        let elapsed = start_time.elapsed();

        info!(
            "Parallel execution complete: {}/{} succeeded, {} failed, {} abandoned in {:.2}s",
            succeeded,
            total,
            failures.len(),
            total - succeeded - failures.len(),
            elapsed.as_secs_f64()
        );

        ExecutionReport {
            slots,
            failures,
            interruption,
            workers,
            elapsed,
        }
    }
}

/// Store one outcome by input index. Returns `true` for a success.
fn record<T: Clone, R, E>(
    items: &[T],
    slots: &mut [Option<R>],
    failures: &mut Vec<ItemFailure<T, E>>,
    index: usize,
    outcome: Result<R, E>,
) -> bool {
    match outcome {
        Ok(result) => {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
            true
        }
        Err(error) => {
            if let Some(item) = items.get(index) {
                failures.push(ItemFailure {
                    index,
                    item: item.clone(),
                    error,
                });
            }
            false
        }
    }
}

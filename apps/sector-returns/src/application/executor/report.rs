//! Result types for parallel execution.

use std::time::Duration;

use super::error::ExecutorError;

/// One item whose work returned an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure<T, E> {
    /// Position of the item in the input.
    pub index: usize,
    /// The item itself.
    pub item: T,
    /// Error returned by the work.
    pub error: E,
}

/// Outcome of one executor run.
///
/// `slots[i]` holds the result for input `i` when its work succeeded, and
/// `None` when it failed or was abandoned.
#[derive(Debug)]
pub struct ExecutionReport<T, R, E> {
    /// Per-index successful results.
    pub slots: Vec<Option<R>>,
    /// Failed items, in input order.
    pub failures: Vec<ItemFailure<T, E>>,
    /// Set when the run stopped early.
    pub interruption: Option<ExecutorError>,
    /// Workers actually started.
    pub workers: usize,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl<T, R, E> ExecutionReport<T, R, E> {
    /// Number of input items.
    #[must_use]
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// Number of items whose work succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Number of items whose work returned an error.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Number of items that never produced an outcome.
    #[must_use]
    pub fn abandoned(&self) -> usize {
        self.total()
            .saturating_sub(self.succeeded())
            .saturating_sub(self.failed())
    }

    /// Whether every item produced an outcome.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.interruption.is_none() && self.abandoned() == 0
    }

    /// Successful results in input order.
    #[must_use]
    pub fn into_successes(self) -> Vec<R> {
        self.slots.into_iter().flatten().collect()
    }
}

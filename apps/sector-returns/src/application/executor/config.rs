//! Configuration for parallel execution.

use std::time::Duration;

/// Default cap on concurrent workers.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Default bound on one run.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30 * 60);

/// Configuration for parallel execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum number of workers (0 is treated as 1).
    pub max_workers: usize,

    /// Bound on the whole run (`None` = no deadline).
    pub deadline: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            deadline: Some(DEFAULT_DEADLINE),
        }
    }
}

impl ExecutorConfig {
    /// Set the worker cap.
    #[must_use]
    pub const fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Set or clear the deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

//! Error types for parallel execution.

use thiserror::Error;

/// Why a run stopped before every item completed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// The caller's cancellation token fired.
    #[error("Execution cancelled")]
    Cancelled,

    /// The configured deadline elapsed.
    #[error("Execution deadline of {seconds}s exceeded")]
    DeadlineExceeded {
        /// Deadline in seconds.
        seconds: u64,
    },
}

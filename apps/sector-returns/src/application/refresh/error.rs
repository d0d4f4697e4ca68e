//! Refresh error types.

use thiserror::Error;

use crate::application::executor::ExecutorError;
use crate::application::ports::TickerSourceError;

/// Why a refresh did not install a new snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The instrument list could not be acquired.
    #[error("ticker source failed: {0}")]
    TickerSource(#[from] TickerSourceError),

    /// Too many instruments failed.
    #[error("too many item errors: {count} (limit {limit})")]
    TooManyItemErrors {
        /// Failures observed.
        count: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// Interrupted before any instrument succeeded.
    #[error("refresh interrupted with no results: {0}")]
    Interrupted(ExecutorError),

    /// Every instrument failed.
    #[error("no instrument produced a return ({failed} failed)")]
    NoResults {
        /// Failures observed.
        failed: usize,
    },

    /// Another refresh is running and the policy is `reject`.
    #[error("a refresh is already in progress")]
    AlreadyRunning,
}

impl RefreshError {
    /// Whether the error was caused by the concurrency policy.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyRunning)
    }
}

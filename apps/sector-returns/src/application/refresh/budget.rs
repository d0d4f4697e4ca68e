//! Per-refresh item error budget.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

/// Counts item failures within one refresh and trips once the count
/// passes the limit.
///
/// Tripping cancels [`ErrorBudget::token`], which stops the executor from
/// dispatching further items. A limit of zero never trips.
#[derive(Debug)]
pub struct ErrorBudget {
    limit: usize,
    count: AtomicUsize,
    token: CancellationToken,
}

impl ErrorBudget {
    /// Create a budget whose token is a child of `parent`.
    #[must_use]
    pub fn new(limit: usize, parent: &CancellationToken) -> Self {
        Self {
            limit,
            count: AtomicUsize::new(0),
            token: parent.child_token(),
        }
    }

    /// Record one failure. Returns `true` if this failure tripped the budget.
    pub fn record_failure(&self) -> bool {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.limit > 0 && count == self.limit + 1 {
            self.token.cancel();
            return true;
        }
        false
    }

    /// Failures recorded so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Configured limit (0 = unlimited).
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Whether the count has passed the limit.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.limit > 0 && self.count() > self.limit
    }

    /// Token cancelled when the budget trips or the parent is cancelled.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_limit_exceeded() {
        let parent = CancellationToken::new();
        let budget = ErrorBudget::new(2, &parent);

        assert!(!budget.record_failure());
        assert!(!budget.record_failure());
        assert!(!budget.exhausted());
        assert!(!budget.token().is_cancelled());

        assert!(budget.record_failure());
        assert!(budget.exhausted());
        assert!(budget.token().is_cancelled());
        assert!(!parent.is_cancelled());

        assert!(!budget.record_failure());
        assert_eq!(budget.count(), 4);
    }

    #[test]
    fn zero_limit_is_unlimited() {
        let budget = ErrorBudget::new(0, &CancellationToken::new());
        for _ in 0..100 {
            budget.record_failure();
        }
        assert!(!budget.exhausted());
        assert!(!budget.token().is_cancelled());
    }

    #[test]
    fn follows_parent_cancellation() {
        let parent = CancellationToken::new();
        let budget = ErrorBudget::new(5, &parent);
        parent.cancel();
        assert!(budget.token().is_cancelled());
        assert!(!budget.exhausted());
    }
}

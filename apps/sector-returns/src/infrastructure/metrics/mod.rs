//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Refreshes**: Count and duration of refreshes by outcome
//! - **Items**: Per-instrument failures by kind
//! - **Snapshot**: Size of the currently installed result set
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first.
///
/// # Errors
///
/// Returns error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "sector_returns_refreshes_total",
        "Total refreshes by outcome"
    );
    describe_histogram!(
        "sector_returns_refresh_duration_seconds",
        "Wall time of a refresh from ticker fetch to install"
    );
    describe_counter!(
        "sector_returns_item_failures_total",
        "Per-instrument failures by kind"
    );
    describe_gauge!(
        "sector_returns_snapshot_items",
        "Instruments in the installed snapshot"
    );
    describe_gauge!(
        "sector_returns_snapshot_categories",
        "Sectors in the installed snapshot"
    );
    describe_counter!(
        "sector_returns_export_failures_total",
        "Snapshot exports that failed"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for refresh outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Every instrument produced an outcome.
    Complete,
    /// Interrupted with partial results installed.
    Degraded,
    /// Nothing installed.
    Failed,
    /// Turned away by the concurrency policy.
    Rejected,
}

impl RefreshOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }
}

/// Record a finished refresh.
pub fn record_refresh(outcome: RefreshOutcome, duration: Duration) {
    counter!(
        "sector_returns_refreshes_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
    histogram!(
        "sector_returns_refresh_duration_seconds",
        "outcome" => outcome.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record a per-instrument failure.
pub fn record_item_failure(kind: &'static str) {
    counter!(
        "sector_returns_item_failures_total",
        "kind" => kind
    )
    .increment(1);
}

/// Update the installed snapshot size.
#[allow(clippy::cast_precision_loss)]
pub fn set_snapshot_size(items: usize, categories: usize) {
    gauge!("sector_returns_snapshot_items").set(items as f64);
    gauge!("sector_returns_snapshot_categories").set(categories as f64);
}

/// Record a failed snapshot export.
pub fn record_export_failure() {
    counter!("sector_returns_export_failures_total").increment(1);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_outcome_as_str() {
        assert_eq!(RefreshOutcome::Complete.as_str(), "complete");
        assert_eq!(RefreshOutcome::Degraded.as_str(), "degraded");
        assert_eq!(RefreshOutcome::Failed.as_str(), "failed");
        assert_eq!(RefreshOutcome::Rejected.as_str(), "rejected");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_refresh(RefreshOutcome::Complete, Duration::from_millis(10));
        record_item_failure("no_data");
        set_snapshot_size(3, 2);
        record_export_failure();
    }
}

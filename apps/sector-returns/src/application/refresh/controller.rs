//! Refresh controller and result cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument as _, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::application::executor::{ExecutionReport, ExecutorConfig, ParallelExecutor};
use crate::application::ports::{
    MarketDataError, MarketDataPort, SnapshotExportPort, TickerSourceError, TickerSourcePort,
};
use crate::domain::instrument::Instrument;
use crate::domain::ranking::{ResultSet, aggregate};
use crate::domain::returns::{self, ReturnError, ReturnRecord};
use crate::domain::window::{DateWindow, RefreshParams};
use crate::infrastructure::metrics::{self, RefreshOutcome};

use super::budget::ErrorBudget;
use super::error::RefreshError;
use super::policy::ConcurrencyPolicy;

/// Default ceiling on per-item failures in one refresh.
pub const DEFAULT_MAX_ITEM_ERRORS: usize = 20;

// =============================================================================
// Types
// =============================================================================

/// Why one instrument was dropped from a refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    /// The provider call failed.
    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    /// The bars could not produce a return.
    #[error(transparent)]
    Return(#[from] ReturnError),
}

impl ItemError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MarketData(e) => e.kind(),
            Self::Return(e) => e.kind(),
        }
    }
}

/// What a reader sees.
#[derive(Debug, Clone)]
pub enum CacheState {
    /// No refresh has succeeded yet.
    Empty,
    /// The most recently installed result set.
    Fresh(Arc<ResultSet>),
}

impl CacheState {
    /// The installed result set, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&Arc<ResultSet>> {
        match self {
            Self::Empty => None,
            Self::Fresh(result) => Some(result),
        }
    }

    /// Whether nothing has been installed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Settings for the refresh pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSettings {
    /// Worker cap and deadline.
    pub executor: ExecutorConfig,
    /// Per-item failure ceiling (0 = unlimited).
    pub max_item_errors: usize,
    /// Behaviour when refreshes overlap.
    pub policy: ConcurrencyPolicy,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            max_item_errors: DEFAULT_MAX_ITEM_ERRORS,
            policy: ConcurrencyPolicy::default(),
        }
    }
}

/// Report of a refresh that installed a snapshot.
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    /// Correlation id for logs.
    pub refresh_id: Uuid,
    /// The installed result set.
    pub result: Arc<ResultSet>,
    /// Instruments returned by the ticker source.
    pub requested: usize,
    /// Instruments dropped with an error.
    pub failed: usize,
    /// Instruments never completed because of an interruption.
    pub abandoned: usize,
    /// Set when the refresh was interrupted but had partial results.
    pub degraded: Option<String>,
    /// Wall time of the pipeline.
    pub elapsed: Duration,
}

// =============================================================================
// Refresh Controller
// =============================================================================

/// Owns the installed result set and serializes its replacement.
pub struct RefreshController {
    tickers: Arc<dyn TickerSourcePort>,
    market_data: Arc<dyn MarketDataPort>,
    exporter: Arc<dyn SnapshotExportPort>,
    executor: ParallelExecutor,
    settings: RefreshSettings,
    current: RwLock<Option<Arc<ResultSet>>>,
    gate: Mutex<()>,
    running: AtomicUsize,
}

impl std::fmt::Debug for RefreshController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshController")
            .field("settings", &self.settings)
            .field("populated", &self.current.read().is_some())
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RefreshController {
    /// Create a controller with an empty cache.
    #[must_use]
    pub fn new(
        tickers: Arc<dyn TickerSourcePort>,
        market_data: Arc<dyn MarketDataPort>,
        exporter: Arc<dyn SnapshotExportPort>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            tickers,
            market_data,
            exporter,
            executor: ParallelExecutor::new(settings.executor.clone()),
            settings,
            current: RwLock::new(None),
            gate: Mutex::new(()),
            running: AtomicUsize::new(0),
        }
    }

    /// Get the settings.
    #[must_use]
    pub const fn settings(&self) -> &RefreshSettings {
        &self.settings
    }

    /// Current cache state. Never blocks on a running refresh.
    #[must_use]
    pub fn snapshot(&self) -> CacheState {
        self.current
            .read()
            .as_ref()
            .map_or(CacheState::Empty, |result| CacheState::Fresh(Arc::clone(result)))
    }

    /// Whether a refresh is currently executing.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.running.load(Ordering::SeqCst) > 0
    }

    /// Refresh for the window `params` select, relative to today (UTC).
    ///
    /// # Errors
    ///
    /// See [`RefreshController::refresh_window`].
    pub async fn refresh(
        &self,
        params: RefreshParams,
        cancel: &CancellationToken,
    ) -> Result<RefreshSummary, RefreshError> {
        let window = params.resolve(Utc::now().date_naive());
        self.refresh_window(window, cancel).await
    }

    /// Run the full pipeline for `window` and install the result.
    ///
    /// # Errors
    ///
    /// Returns error, leaving the installed snapshot unchanged, if the ticker
    /// source fails or is empty, the item failure ceiling is exceeded, no
    /// instrument succeeds, or the policy rejects an overlapping refresh.
    pub async fn refresh_window(
        &self,
        window: DateWindow,
        cancel: &CancellationToken,
    ) -> Result<RefreshSummary, RefreshError> {
        let _permit = match self.settings.policy {
            ConcurrencyPolicy::Race => None,
            ConcurrencyPolicy::Queue => Some(self.gate.lock().await),
            ConcurrencyPolicy::Reject => {
                if let Ok(permit) = self.gate.try_lock() {
                    Some(permit)
                } else {
                    warn!(%window, "Refresh rejected, another is in progress");
                    metrics::record_refresh(RefreshOutcome::Rejected, Duration::ZERO);
                    return Err(RefreshError::AlreadyRunning);
                }
            }
        };

        let _running = RunningGuard::enter(&self.running);
        let refresh_id = Uuid::new_v4();
        let span = info_span!("refresh", %refresh_id, %window);
        let started = Instant::now();

        let result = self
            .run_pipeline(refresh_id, window, cancel)
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(summary) if summary.degraded.is_some() => RefreshOutcome::Degraded,
            Ok(_) => RefreshOutcome::Complete,
            Err(_) => RefreshOutcome::Failed,
        };
        metrics::record_refresh(outcome, started.elapsed());
        result
    }

    async fn run_pipeline(
        &self,
        refresh_id: Uuid,
        window: DateWindow,
        cancel: &CancellationToken,
    ) -> Result<RefreshSummary, RefreshError> {
        let started = Instant::now();
        info!("Starting refresh");

        let instruments = self.tickers.instruments().await.inspect_err(|e| {
            error!(error = %e, "Ticker source failed, keeping current snapshot");
        })?;
        if instruments.is_empty() {
            error!("Ticker source returned no instruments, keeping current snapshot");
            return Err(TickerSourceError::NoInstruments.into());
        }
        let requested = instruments.len();
        info!(instruments = requested, "Fetched instrument list");

        let budget = Arc::new(ErrorBudget::new(self.settings.max_item_errors, cancel));
        let report = self.execute(instruments, window, &budget).await;

        for failure in &report.failures {
            debug!(
                symbol = failure.item.symbol(),
                kind = failure.error.kind(),
                error = %failure.error,
                "Instrument skipped"
            );
            metrics::record_item_failure(failure.error.kind());
        }

        if budget.exhausted() {
            error!(
                failures = budget.count(),
                limit = budget.limit(),
                "Item failure ceiling exceeded, keeping current snapshot"
            );
            return Err(RefreshError::TooManyItemErrors {
                count: budget.count(),
                limit: budget.limit(),
            });
        }

        let failed = report.failed();
        let abandoned = report.abandoned();
        let interruption = report.interruption.clone();

        if report.succeeded() == 0 {
            let err = interruption.map_or(
                RefreshError::NoResults { failed },
                RefreshError::Interrupted,
            );
            error!(error = %err, "Refresh produced nothing, keeping current snapshot");
            return Err(err);
        }

        let degraded = interruption.map(|e| {
            warn!(
                error = %e,
                abandoned,
                "Refresh interrupted, installing partial results"
            );
            e.to_string()
        });

        let result = Arc::new(aggregate(report.into_successes(), window, Utc::now()));
        self.install(Arc::clone(&result));

        if let Err(e) = self.exporter.export(&result).await {
            warn!(error = %e, "Snapshot export failed");
            metrics::record_export_failure();
        }

        let elapsed = started.elapsed();
        info!(
            items = result.item_count(),
            categories = result.category_count(),
            failed,
            abandoned,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Refresh installed"
        );

        Ok(RefreshSummary {
            refresh_id,
            result,
            requested,
            failed,
            abandoned,
            degraded,
            elapsed,
        })
    }

    async fn execute(
        &self,
        instruments: Vec<Instrument>,
        window: DateWindow,
        budget: &Arc<ErrorBudget>,
    ) -> ExecutionReport<Instrument, ReturnRecord, ItemError> {
        let market_data = Arc::clone(&self.market_data);
        let work_budget = Arc::clone(budget);

        self.executor
            .run(
                instruments,
                move |instrument: Instrument| {
                    let market_data = Arc::clone(&market_data);
                    let budget = Arc::clone(&work_budget);
                    async move {
                        let outcome =
                            fetch_return(market_data.as_ref(), &instrument, &window).await;
                        if outcome.is_err() && budget.record_failure() {
                            warn!(
                                limit = budget.limit(),
                                "Item failure ceiling exceeded, stopping dispatch"
                            );
                        }
                        outcome
                    }
                },
                budget.token(),
            )
            .await
    }

    fn install(&self, result: Arc<ResultSet>) {
        metrics::set_snapshot_size(result.item_count(), result.category_count());
        *self.current.write() = Some(result);
    }
}

async fn fetch_return(
    market_data: &dyn MarketDataPort,
    instrument: &Instrument,
    window: &DateWindow,
) -> Result<ReturnRecord, ItemError> {
    let bars = market_data.daily_bars(instrument.symbol(), window).await?;
    Ok(returns::compute(instrument, bars)?)
}

/// Tracks running refreshes for the lifetime of one call.
struct RunningGuard<'a>(&'a AtomicUsize);

impl<'a> RunningGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

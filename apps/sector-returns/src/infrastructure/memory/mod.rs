//! In-memory collaborators for tests and offline runs.
//!
//! - `StaticTickerSource`: a fixed, swappable instrument list
//! - `InMemoryMarketData`: canned bars with per-symbol failures and latency

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::application::ports::{
    MarketDataError, MarketDataPort, TickerSourceError, TickerSourcePort,
};
use crate::domain::instrument::{Instrument, PriceBar};
use crate::domain::window::DateWindow;

// =============================================================================
// Static Ticker Source
// =============================================================================

/// Ticker source returning a fixed list.
///
/// Clones share state, so a test can swap the list or inject a failure
/// after handing a clone to the controller.
#[derive(Debug, Clone)]
pub struct StaticTickerSource {
    state: Arc<Mutex<Result<Vec<Instrument>, TickerSourceError>>>,
}

impl StaticTickerSource {
    /// Create a source returning `instruments`.
    #[must_use]
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self {
            state: Arc::new(Mutex::new(Ok(instruments))),
        }
    }

    /// Replace the instrument list.
    pub fn set_instruments(&self, instruments: Vec<Instrument>) {
        *self.state.lock() = Ok(instruments);
    }

    /// Make every subsequent call fail with `error`.
    pub fn set_failure(&self, error: TickerSourceError) {
        *self.state.lock() = Err(error);
    }
}

#[async_trait]
impl TickerSourcePort for StaticTickerSource {
    async fn instruments(&self) -> Result<Vec<Instrument>, TickerSourceError> {
        self.state.lock().clone()
    }
}

// =============================================================================
// In-Memory Market Data
// =============================================================================

/// Market data provider backed by a map of canned responses.
///
/// Unknown symbols fail with [`MarketDataError::SymbolNotFound`]. The window
/// is not applied; stored bars are returned as-is.
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    bars: HashMap<String, Vec<PriceBar>>,
    failures: HashMap<String, MarketDataError>,
    latency: Option<Duration>,
    symbol_latency: HashMap<String, Duration>,
    calls: AtomicUsize,
}

impl InMemoryMarketData {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bars` for `symbol`.
    #[must_use]
    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    /// Serve one daily bar per close for `symbol`, on consecutive days.
    #[must_use]
    pub fn with_closes(self, symbol: &str, closes: &[Decimal]) -> Self {
        let bars = closes
            .iter()
            .zip(0i64..)
            .map(|(close, day)| {
                PriceBar::new(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(day), *close)
            })
            .collect();
        self.with_bars(symbol, bars)
    }

    /// Fail every request for `symbol` with `error`.
    #[must_use]
    pub fn with_failure(mut self, symbol: &str, error: MarketDataError) -> Self {
        self.failures.insert(symbol.to_string(), error);
        self
    }

    /// Delay every response.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delay responses for one symbol.
    #[must_use]
    pub fn with_symbol_latency(mut self, symbol: &str, latency: Duration) -> Self {
        self.symbol_latency.insert(symbol.to_string(), latency);
        self
    }

    /// Requests served so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataPort for InMemoryMarketData {
    async fn daily_bars(
        &self,
        symbol: &str,
        _window: &DateWindow,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.symbol_latency.get(symbol).copied().or(self.latency) {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.failures.get(symbol) {
            return Err(error.clone());
        }

        self.bars
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }
}

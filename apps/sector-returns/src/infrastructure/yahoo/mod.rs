//! Yahoo Chart Market Data Provider
//!
//! Implements `MarketDataPort` against Yahoo Finance's v8 chart API,
//! requesting daily bars for the window. `period2` is the day after the
//! window end so the last day is included.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use crate::application::ports::{MarketDataError, MarketDataPort};
use crate::domain::instrument::PriceBar;
use crate::domain::window::DateWindow;

/// Browser user agent; the chart API rejects unknown clients.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

// =============================================================================
// Adapter
// =============================================================================

/// Market data provider backed by the Yahoo chart API.
#[derive(Debug, Clone)]
pub struct YahooMarketData {
    client: reqwest::Client,
    base_url: String,
}

impl YahooMarketData {
    /// Create a new provider.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MarketDataError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Chart endpoint URL for `symbol`.
    fn chart_url(&self, symbol: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, yahoo_symbol(symbol))
    }
}

#[async_trait]
impl MarketDataPort for YahooMarketData {
    async fn daily_bars(
        &self,
        symbol: &str,
        window: &DateWindow,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        let (period1, period2) = period_bounds(window);
        debug!(symbol, period1, period2, "Fetching chart");

        let response = self
            .client
            .get(self.chart_url(symbol))
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .map_err(|e| MarketDataError::ConnectionError {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            return Err(MarketDataError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::ApiError {
                message: format!("chart request for {symbol} failed ({status}): {body}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| MarketDataError::ConnectionError {
                message: e.to_string(),
            })?;

        parse_chart(symbol, &body)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Yahoo uses `-` where exchanges use `.` for share classes (`BRK.B` -> `BRK-B`).
#[must_use]
pub fn yahoo_symbol(symbol: &str) -> String {
    symbol.trim().replace('.', "-")
}

/// Unix `period1`/`period2` for a window; `period2` is exclusive.
#[must_use]
pub fn period_bounds(window: &DateWindow) -> (i64, i64) {
    let end_exclusive = window
        .end()
        .checked_add_days(Days::new(1))
        .unwrap_or_else(|| window.end());
    (midnight_utc(window.start()), midnight_utc(end_exclusive))
}

fn midnight_utc(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map_or(0, |dt| dt.and_utc().timestamp())
}

/// Decode a chart response body into bars.
///
/// Bars whose close is null (halted or partial days) are skipped.
///
/// # Errors
///
/// Returns [`MarketDataError::InvalidResponse`] for malformed JSON or values,
/// [`MarketDataError::SymbolNotFound`] for a "Not Found" chart error, and
/// [`MarketDataError::DataUnavailable`] for any other chart error.
pub fn parse_chart(symbol: &str, body: &str) -> Result<Vec<PriceBar>, MarketDataError> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::InvalidResponse {
            message: format!("{symbol}: {e}"),
        })?;

    if let Some(error) = response.chart.error {
        if error.code == "Not Found" {
            return Err(MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        return Err(MarketDataError::DataUnavailable {
            message: format!("{symbol}: {}: {}", error.code, error.description),
        });
    }

    let data = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| MarketDataError::DataUnavailable {
            message: format!("{symbol}: empty chart result"),
        })?;

    // No timestamps means no trading days in the range.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let closes = data
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (ts, close) in timestamps.iter().zip(closes) {
        let Some(close) = close.filter(|c| c.is_finite()) else {
            continue;
        };
        let timestamp =
            DateTime::from_timestamp(*ts, 0).ok_or_else(|| MarketDataError::InvalidResponse {
                message: format!("{symbol}: invalid timestamp {ts}"),
            })?;
        let close = Decimal::try_from(close).map_err(|e| MarketDataError::InvalidResponse {
            message: format!("{symbol}: unrepresentable close {close}: {e}"),
        })?;
        bars.push(PriceBar::new(timestamp, close));
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn share_class_symbols_normalized() {
        assert_eq!(yahoo_symbol("BRK.B"), "BRK-B");
        assert_eq!(yahoo_symbol("BF.B"), "BF-B");
        assert_eq!(yahoo_symbol("AAPL"), "AAPL");
    }

    #[test]
    fn period_end_is_exclusive_next_day() {
        let window = DateWindow::starting_at(2024, 2, 1).unwrap();
        let (period1, period2) = period_bounds(&window);
        // 2024-02-01T00:00:00Z and 2024-03-01T00:00:00Z
        assert_eq!(period1, 1_706_745_600);
        assert_eq!(period2, 1_709_251_200);
    }

    #[test]
    fn parses_closes_and_skips_nulls() {
        let body = r#"{"chart":{"result":[{"timestamp":[1706797800,1706884200,1706970600],
            "indicators":{"quote":[{"close":[100.5,null,110.25]}]}}],"error":null}}"#;

        let bars = parse_chart("XOM", body).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(100.5));
        assert_eq!(bars[1].close, dec!(110.25));
        assert!(bars[0].timestamp < bars[1].timestamp);
    }

    #[test]
    fn missing_timestamps_is_empty() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart("XOM", body).unwrap().is_empty());
    }

    #[test]
    fn not_found_chart_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("GONE", body).unwrap_err();
        assert_eq!(
            err,
            MarketDataError::SymbolNotFound {
                symbol: "GONE".to_string()
            }
        );
    }

    #[test]
    fn other_chart_error_is_unavailable() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        let err = parse_chart("X", body).unwrap_err();
        assert!(matches!(err, MarketDataError::DataUnavailable { .. }));
    }

    #[test]
    fn malformed_json_is_invalid_response() {
        let err = parse_chart("X", "<html>").unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidResponse { .. }));
    }
}

//! Market Data Port (Driven Port)
//!
//! Interface for fetching daily price bars from an external provider.

use async_trait::async_trait;

use crate::domain::instrument::PriceBar;
use crate::domain::window::DateWindow;

/// Market data error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketDataError {
    /// Connection error.
    #[error("Market data connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Symbol not found.
    #[error("Symbol not found: {symbol}")]
    SymbolNotFound {
        /// The unknown symbol.
        symbol: String,
    },

    /// Data unavailable.
    #[error("Market data unavailable: {message}")]
    DataUnavailable {
        /// Error details.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Response body could not be decoded.
    #[error("Invalid market data response: {message}")]
    InvalidResponse {
        /// Error details.
        message: String,
    },

    /// API error.
    #[error("Market data API error: {message}")]
    ApiError {
        /// Error details.
        message: String,
    },
}

impl MarketDataError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionError { .. } => "connection",
            Self::SymbolNotFound { .. } => "symbol_not_found",
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::ApiError { .. } => "api",
        }
    }
}

/// Port for fetching daily bars.
///
/// Implementations return bars in ascending time order for the inclusive
/// window. An empty vector means the provider had nothing for the range.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fetch daily bars for `symbol` within `window`.
    async fn daily_bars(
        &self,
        symbol: &str,
        window: &DateWindow,
    ) -> Result<Vec<PriceBar>, MarketDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_are_distinct() {
        let errors = [
            MarketDataError::ConnectionError {
                message: "reset".to_string(),
            },
            MarketDataError::SymbolNotFound {
                symbol: "NOPE".to_string(),
            },
            MarketDataError::DataUnavailable {
                message: "no data".to_string(),
            },
            MarketDataError::RateLimited {
                retry_after_secs: 5,
            },
            MarketDataError::InvalidResponse {
                message: "eof".to_string(),
            },
            MarketDataError::ApiError {
                message: "500".to_string(),
            },
        ];
        let mut kinds: Vec<&str> = errors.iter().map(MarketDataError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn error_display() {
        let err = MarketDataError::SymbolNotFound {
            symbol: "BRK.B".to_string(),
        };
        assert_eq!(err.to_string(), "Symbol not found: BRK.B");
    }
}

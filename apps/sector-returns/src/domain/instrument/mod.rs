//! Instrument Types
//!
//! Domain types for the tradable universe: instruments with their sector
//! label, and the daily price bars fetched for them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Sector assigned to instruments without a usable group label.
pub const UNKNOWN_GROUP: &str = "Unknown";

/// Default exclusive upper bound on symbol length.
pub const DEFAULT_MAX_SYMBOL_LEN: usize = 10;

// =============================================================================
// Instrument
// =============================================================================

/// One tradable symbol with its category (sector) label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    symbol: String,
    group: String,
}

impl Instrument {
    /// Create a validated instrument.
    ///
    /// The symbol is trimmed; a blank or missing group becomes [`UNKNOWN_GROUP`].
    ///
    /// # Errors
    ///
    /// Returns error if the symbol is empty or not shorter than `max_symbol_len`.
    pub fn new(
        symbol: impl AsRef<str>,
        group: Option<&str>,
        max_symbol_len: usize,
    ) -> Result<Self, DomainError> {
        let symbol = symbol.as_ref().trim();

        if symbol.is_empty() {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: "Symbol cannot be empty".to_string(),
            });
        }

        if symbol.len() >= max_symbol_len {
            return Err(DomainError::InvalidValue {
                field: "symbol".to_string(),
                message: format!("Symbol '{symbol}' exceeds maximum length {max_symbol_len}"),
            });
        }

        Ok(Self {
            symbol: symbol.to_string(),
            group: normalize_group(group),
        })
    }

    /// Get the symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get the group (sector) label.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.symbol, self.group)
    }
}

/// Map a raw group label to its canonical form.
#[must_use]
pub fn normalize_group(group: Option<&str>) -> String {
    match group.map(str::trim) {
        Some(g) if !g.is_empty() => g.to_string(),
        _ => UNKNOWN_GROUP.to_string(),
    }
}

// =============================================================================
// Price Bar
// =============================================================================

/// A single daily bar, reduced to what the return calculation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Bar open time.
    pub timestamp: DateTime<Utc>,
    /// Closing price.
    pub close: Decimal,
}

impl PriceBar {
    /// Create a new bar.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, close: Decimal) -> Self {
        Self { timestamp, close }
    }
}

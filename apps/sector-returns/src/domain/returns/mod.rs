//! Return Calculation
//!
//! Turns one instrument's daily bars into a validated [`ReturnRecord`].
//! The return is `last_close / first_close - 1`, computed in decimal and
//! narrowed to `f64` only for display. Records that would be meaningless
//! (no bars, zero first close) are rejected here and never reach a result set.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use super::instrument::{Instrument, PriceBar};

// =============================================================================
// Errors
// =============================================================================

/// Reasons a bar sequence cannot produce a return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReturnError {
    /// The provider returned no bars for the window.
    #[error("no price data for {symbol}")]
    NoData {
        /// Instrument symbol.
        symbol: String,
    },

    /// The first close was exactly zero.
    #[error("first close is zero for {symbol}")]
    InvalidFirstClose {
        /// Instrument symbol.
        symbol: String,
    },

    /// The ratio could not be represented.
    #[error("return overflow for {symbol}")]
    ArithmeticOverflow {
        /// Instrument symbol.
        symbol: String,
    },
}

impl ReturnError {
    /// Short label used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoData { .. } => "no_data",
            Self::InvalidFirstClose { .. } => "invalid_first_close",
            Self::ArithmeticOverflow { .. } => "overflow",
        }
    }
}

// =============================================================================
// Return Record
// =============================================================================

/// Validated return for one instrument over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnRecord {
    /// Instrument symbol.
    pub symbol: String,
    /// Sector label.
    pub group: String,
    /// Exact decimal return.
    pub return_decimal: Decimal,
    /// Display return, narrowed from `return_decimal`.
    pub return_value: f64,
    /// Number of bars consumed (always at least one).
    pub bar_count: usize,
    /// Close of the first bar (never zero).
    pub first_close: Decimal,
    /// Close of the last bar.
    pub last_close: Decimal,
}

impl ReturnRecord {
    /// Return expressed as a percentage.
    #[must_use]
    pub fn percent(&self) -> f64 {
        self.return_value * 100.0
    }
}

/// Compute the return for `instrument` from its bars.
///
/// Bars are expected in ascending time order; only the first and last close
/// matter. A single bar yields a return of zero.
///
/// # Errors
///
/// Returns [`ReturnError::NoData`] for an empty sequence,
/// [`ReturnError::InvalidFirstClose`] when the first close is zero, and
/// [`ReturnError::ArithmeticOverflow`] when the ratio does not fit.
pub fn compute<I>(instrument: &Instrument, bars: I) -> Result<ReturnRecord, ReturnError>
where
    I: IntoIterator<Item = PriceBar>,
{
    let mut first: Option<Decimal> = None;
    let mut last = Decimal::ZERO;
    let mut count = 0usize;

    for bar in bars {
        if first.is_none() {
            first = Some(bar.close);
        }
        last = bar.close;
        count += 1;
    }

    let symbol = instrument.symbol();
    let Some(first) = first else {
        return Err(ReturnError::NoData {
            symbol: symbol.to_string(),
        });
    };

    if first.is_zero() {
        return Err(ReturnError::InvalidFirstClose {
            symbol: symbol.to_string(),
        });
    }

    let overflow = || ReturnError::ArithmeticOverflow {
        symbol: symbol.to_string(),
    };
    let return_decimal = last
        .checked_div(first)
        .and_then(|ratio| ratio.checked_sub(Decimal::ONE))
        .ok_or_else(overflow)?;
    let return_value = return_decimal.to_f64().ok_or_else(overflow)?;

    Ok(ReturnRecord {
        symbol: symbol.to_string(),
        group: instrument.group().to_string(),
        return_decimal,
        return_value,
        bar_count: count,
        first_close: first,
        last_close: last,
    })
}

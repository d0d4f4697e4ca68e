//! Domain Layer - Core return and ranking logic.
//!
//! This layer contains the pure types and computations of the scanner:
//! instruments, date windows, per-instrument returns, and the sector
//! rollup. Nothing here performs I/O.

/// Instruments and price bars.
pub mod instrument;

/// Sector aggregation and ranking.
pub mod ranking;

/// Per-instrument return calculation.
pub mod returns;

/// Date windows and refresh parameters.
pub mod window;

/// Domain-level validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Invalid value for a field.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field name.
        field: String,
        /// Error message.
        message: String,
    },
}

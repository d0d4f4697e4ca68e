//! Ticker Source Port (Driven Port)
//!
//! Interface for acquiring the instrument universe.

use async_trait::async_trait;

use crate::domain::instrument::Instrument;

/// Ticker source error. Any of these aborts a refresh before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TickerSourceError {
    /// Connection error.
    #[error("Ticker source connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Non-success HTTP status.
    #[error("Ticker source returned HTTP {status}")]
    HttpStatus {
        /// Status code.
        status: u16,
    },

    /// The source document did not have the expected shape.
    #[error("Ticker source parse error: {message}")]
    ParseError {
        /// Error details.
        message: String,
    },

    /// Too many malformed rows in one scrape.
    #[error("Too many malformed rows: {count} (limit {limit})")]
    TooManyErrors {
        /// Malformed rows seen.
        count: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// The source yielded no instruments.
    #[error("Ticker source returned no instruments")]
    NoInstruments,
}

/// Port for listing instruments.
#[async_trait]
pub trait TickerSourcePort: Send + Sync {
    /// Fetch the current instrument list.
    async fn instruments(&self) -> Result<Vec<Instrument>, TickerSourceError>;
}

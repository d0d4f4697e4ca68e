#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Sector Returns - Month-to-Date Return Scanner
//!
//! Scrapes the S&P 500 constituent list, fetches daily bars for every ticker
//! through a bounded worker pool, computes each ticker's return over a date
//! window, ranks tickers and GICS sectors, and serves the latest snapshot
//! over HTTP.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and calculations
//!   - `instrument`: Symbols, sectors, and daily bars
//!   - `window`: Date windows and lenient refresh parameters
//!   - `returns`: Per-instrument return calculation
//!   - `ranking`: Ranked result sets with sector means
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Ticker source, market data, and snapshot export interfaces
//!   - `executor`: Generic bounded parallel executor
//!   - `refresh`: Refresh pipeline and the installed snapshot
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `wikipedia`: Constituents scraper
//!   - `yahoo`: Chart API market data
//!   - `export`: CSV artifact
//!   - `http`: Query surface
//!   - `config`, `metrics`, `telemetry`: Process concerns
//!
//! # Data Flow
//!
//! ```text
//! GET /api/mtd ──► RefreshController ──► TickerSource
//!                        │
//!                        ▼
//!                 ParallelExecutor ──► MarketData ──► compute
//!                        │
//!                        ▼
//!                    aggregate ──► install (Arc swap) ──► CSV export
//!                                        │
//! GET /api/results, / ◄──────── snapshot ┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Pure types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::instrument::{Instrument, PriceBar};
pub use domain::ranking::{CategorySummary, ResultSet, aggregate};
pub use domain::returns::{ReturnError, ReturnRecord, compute};
pub use domain::window::{DateWindow, RefreshParams};

// Application
pub use application::executor::{ExecutionReport, ExecutorConfig, ExecutorError, ParallelExecutor};
pub use application::refresh::{
    CacheState, ConcurrencyPolicy, RefreshController, RefreshError, RefreshSettings,
    RefreshSummary,
};

// Infrastructure config
pub use infrastructure::config::{AppConfig, ConfigError};

// HTTP server
pub use infrastructure::http::{HttpServer, HttpServerError, HttpServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

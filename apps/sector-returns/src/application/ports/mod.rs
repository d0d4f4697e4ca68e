//! Application Ports (Driven)
//!
//! Interfaces the refresh pipeline uses to reach external systems.
//! Infrastructure adapters implement these; tests substitute in-memory ones.
//!
//! - `TickerSourcePort`: the instrument universe
//! - `MarketDataPort`: daily bars per instrument
//! - `SnapshotExportPort`: persistence of a finished result set

mod export_port;
mod market_data_port;
mod ticker_source_port;

pub use export_port::{ExportError, NoOpExporter, SnapshotExportPort};
pub use market_data_port::{MarketDataError, MarketDataPort};
pub use ticker_source_port::{TickerSourceError, TickerSourcePort};

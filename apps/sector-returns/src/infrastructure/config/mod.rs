//! Configuration Module
//!
//! Configuration loading for the sector returns service.

mod settings;

pub use settings::{
    AppConfig, ConfigError, ExportSettings, MarketDataSettings, RefreshConfig, ServerSettings,
    TickerSettings,
};

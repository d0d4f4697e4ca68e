//! Service Configuration Settings
//!
//! Configuration types for the sector returns service, loaded from
//! environment variables. Every variable is optional; unset or unparsable
//! numeric values fall back to their defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::application::executor::ExecutorConfig;
use crate::application::refresh::{ConcurrencyPolicy, RefreshSettings};
use crate::domain::instrument::DEFAULT_MAX_SYMBOL_LEN;

/// Default S&P 500 constituents page.
pub const DEFAULT_TICKER_SOURCE_URL: &str =
    "https://en.wikipedia.org/wiki/List_of_S%26P_500_companies";

/// Default chart API base URL.
pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Default CSV artifact path.
pub const DEFAULT_CSV_OUTPUT_PATH: &str = "sp500_mtd_returns.csv";

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Port for the query API, HTML page, health and metrics.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8080 }
    }
}

/// Refresh pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Worker cap for the parallel executor.
    pub max_workers: usize,
    /// Bound on one refresh (`None` = no deadline).
    pub deadline: Option<Duration>,
    /// Per-item failure ceiling (0 = unlimited).
    pub max_item_errors: usize,
    /// Overlapping refresh behaviour.
    pub policy: ConcurrencyPolicy,
    /// Run one refresh in the background at startup.
    pub on_startup: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        let defaults = RefreshSettings::default();
        Self {
            max_workers: defaults.executor.max_workers,
            deadline: defaults.executor.deadline,
            max_item_errors: defaults.max_item_errors,
            policy: defaults.policy,
            on_startup: false,
        }
    }
}

impl RefreshConfig {
    /// Settings for the refresh controller.
    #[must_use]
    pub fn settings(&self) -> RefreshSettings {
        RefreshSettings {
            executor: ExecutorConfig::default()
                .with_max_workers(self.max_workers)
                .with_deadline(self.deadline),
            max_item_errors: self.max_item_errors,
            policy: self.policy,
        }
    }
}

/// Ticker source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerSettings {
    /// Constituents page URL.
    pub source_url: String,
    /// Exclusive upper bound on symbol length.
    pub max_symbol_len: usize,
    /// Malformed rows tolerated per scrape.
    pub max_scrape_errors: usize,
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_TICKER_SOURCE_URL.to_string(),
            max_symbol_len: DEFAULT_MAX_SYMBOL_LEN,
            max_scrape_errors: 20,
        }
    }
}

/// Market data provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDataSettings {
    /// Chart API base URL.
    pub base_url: String,
    /// Timeout for each outbound HTTP request.
    pub request_timeout: Duration,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MARKET_DATA_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Snapshot export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// CSV output path (`None` = export disabled).
    pub csv_path: Option<PathBuf>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            csv_path: Some(PathBuf::from(DEFAULT_CSV_OUTPUT_PATH)),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Refresh pipeline settings.
    pub refresh: RefreshConfig,
    /// Ticker source settings.
    pub ticker: TickerSettings,
    /// Market data provider settings.
    pub market_data: MarketDataSettings,
    /// Snapshot export settings.
    pub export: ExportSettings,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = Self::default();

        let server = ServerSettings {
            http_port: env.parse("HTTP_PORT", defaults.server.http_port),
        };

        let policy = match env.get("REFRESH_CONCURRENCY") {
            Some(raw) => raw
                .parse::<ConcurrencyPolicy>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "REFRESH_CONCURRENCY".to_string(),
                    message,
                })?,
            None => defaults.refresh.policy,
        };

        let refresh = RefreshConfig {
            max_workers: env.parse("REFRESH_MAX_WORKERS", defaults.refresh.max_workers),
            deadline: env
                .optional_duration_secs("REFRESH_DEADLINE_SECS", defaults.refresh.deadline),
            max_item_errors: env.parse(
                "REFRESH_MAX_ITEM_ERRORS",
                defaults.refresh.max_item_errors,
            ),
            policy,
            on_startup: env.flag("REFRESH_ON_STARTUP", defaults.refresh.on_startup),
        };

        let ticker = TickerSettings {
            source_url: env.non_empty("TICKER_SOURCE_URL", &defaults.ticker.source_url)?,
            max_symbol_len: env.parse(
                "TICKER_MAX_SYMBOL_LEN",
                defaults.ticker.max_symbol_len,
            ),
            max_scrape_errors: env.parse(
                "TICKER_MAX_SCRAPE_ERRORS",
                defaults.ticker.max_scrape_errors,
            ),
        };

        let market_data = MarketDataSettings {
            base_url: env.non_empty("MARKET_DATA_BASE_URL", &defaults.market_data.base_url)?,
            request_timeout: Duration::from_secs(
                env.parse(
                    "HTTP_CLIENT_TIMEOUT_SECS",
                    defaults.market_data.request_timeout.as_secs(),
                )
                .max(1),
            ),
        };

        let export = ExportSettings {
            csv_path: match env.get("CSV_OUTPUT_PATH") {
                Some(path) if path.trim().is_empty() => None,
                Some(path) => Some(PathBuf::from(path.trim())),
                None => defaults.export.csv_path,
            },
        };

        Ok(Self {
            server,
            refresh,
            ticker,
            market_data,
            export,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// What was wrong.
        message: String,
    },
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).map_or(default, |v| {
            matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
        })
    }

    fn optional_duration_secs(&self, key: &str, default: Option<Duration>) -> Option<Duration> {
        match self.get(key).and_then(|v| v.trim().parse::<u64>().ok()) {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => default,
        }
    }

    fn non_empty(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        match self.get(key) {
            Some(v) if v.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
            Some(v) => Ok(v.trim().to_string()),
            None => Ok(default.to_string()),
        }
    }
}

//! Sector Returns Binary
//!
//! Starts the month-to-date return scanner and its HTTP query surface.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sector-returns
//! ```
//!
//! # Environment Variables
//!
//! - `HTTP_PORT`: HTTP server port (default: 8080)
//! - `REFRESH_MAX_WORKERS`: Concurrent fetches per refresh (default: 10)
//! - `REFRESH_DEADLINE_SECS`: Refresh deadline, 0 for none (default: 1800)
//! - `REFRESH_MAX_ITEM_ERRORS`: Failed tickers before a refresh aborts, 0 for no limit (default: 20)
//! - `REFRESH_CONCURRENCY`: race | queue | reject (default: queue)
//! - `REFRESH_ON_STARTUP`: Run a refresh for the previous month at startup (default: false)
//! - `TICKER_SOURCE_URL`: Constituents page (default: Wikipedia S&P 500 list)
//! - `TICKER_MAX_SYMBOL_LEN`: Symbols at or over this length are skipped (default: 10)
//! - `TICKER_MAX_SCRAPE_ERRORS`: Malformed rows tolerated per scrape (default: 20)
//! - `MARKET_DATA_BASE_URL`: Chart API base (default: <https://query1.finance.yahoo.com>)
//! - `HTTP_CLIENT_TIMEOUT_SECS`: Outbound request timeout (default: 15)
//! - `CSV_OUTPUT_PATH`: CSV artifact path, empty to disable (default: `sp500_mtd_returns.csv`)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: sector-returns)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use sector_returns::application::ports::{
    MarketDataPort, NoOpExporter, SnapshotExportPort, TickerSourcePort,
};
use sector_returns::infrastructure::export::CsvExporter;
use sector_returns::infrastructure::telemetry;
use sector_returns::infrastructure::wikipedia::WikipediaTickerSource;
use sector_returns::infrastructure::yahoo::YahooMarketData;
use sector_returns::{
    AppConfig, HttpServer, HttpServerState, RefreshController, RefreshParams, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Sector Returns");

    // Initialize Prometheus metrics
    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Metrics recorder not installed");
    }

    let config = AppConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let tickers: Arc<dyn TickerSourcePort> = Arc::new(WikipediaTickerSource::new(
        config.ticker.source_url.clone(),
        config.ticker.max_symbol_len,
        config.ticker.max_scrape_errors,
        config.market_data.request_timeout,
    )?);

    let market_data: Arc<dyn MarketDataPort> = Arc::new(YahooMarketData::new(
        config.market_data.base_url.clone(),
        config.market_data.request_timeout,
    )?);

    let exporter: Arc<dyn SnapshotExportPort> = match &config.export.csv_path {
        Some(path) => Arc::new(CsvExporter::new(path.clone())),
        None => Arc::new(NoOpExporter),
    };

    let controller = Arc::new(RefreshController::new(
        tickers,
        market_data,
        exporter,
        config.refresh.settings(),
    ));

    if config.refresh.on_startup {
        let startup_controller = Arc::clone(&controller);
        let startup_cancel = shutdown_token.clone();
        tokio::spawn(async move {
            match startup_controller
                .refresh(RefreshParams::default(), &startup_cancel)
                .await
            {
                Ok(summary) => tracing::info!(
                    refresh_id = %summary.refresh_id,
                    items = summary.result.item_count(),
                    "Startup refresh installed"
                ),
                Err(e) => tracing::error!(error = %e, "Startup refresh failed"),
            }
        });
    }

    let http_state = Arc::new(HttpServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&controller),
        shutdown_token.clone(),
    ));
    let http_server = HttpServer::new(
        config.server.http_port,
        http_state,
        shutdown_token.clone(),
    );

    let server_handle = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!("Sector Returns ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, server_handle)
        .await
        .is_err()
    {
        tracing::warn!("HTTP server did not stop within the shutdown timeout");
    }

    tracing::info!("Sector Returns stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        http_port = config.server.http_port,
        max_workers = config.refresh.max_workers,
        deadline_secs = config.refresh.deadline.map(|d| d.as_secs()),
        max_item_errors = config.refresh.max_item_errors,
        policy = config.refresh.policy.as_str(),
        on_startup = config.refresh.on_startup,
        "Configuration loaded"
    );
    tracing::debug!(
        ticker_source = %config.ticker.source_url,
        market_data = %config.market_data.base_url,
        csv_path = ?config.export.csv_path,
        "Collaborator endpoints"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}

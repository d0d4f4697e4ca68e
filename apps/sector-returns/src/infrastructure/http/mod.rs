//! HTTP Query Surface
//!
//! Serves the cached snapshot and triggers refreshes. Reads never wait on a
//! running refresh. `/api/mtd` waits for the refresh it starts and reports its
//! outcome, but the refresh runs on its own task: a client that disconnects
//! early detaches from it without aborting it.
//!
//! # Endpoints
//!
//! - `GET /` - HTML results page with a refresh form
//! - `GET /api/results` - Ranked instruments (empty array before the first refresh)
//! - `GET /api/sectors` - Ranked sectors
//! - `GET /api/mtd?year=&month=&day=` - Run a refresh for the selected window
//! - `GET /health` - JSON health status
//! - `GET /metrics` - Prometheus metrics in text format

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::refresh::{CacheState, RefreshController, RefreshError};
use crate::domain::ranking::{CategorySummary, ResultSet};
use crate::domain::returns::ReturnRecord;
use crate::domain::window::{DateWindow, RefreshParams};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// One ranked instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Ticker symbol.
    pub ticker: String,
    /// GICS sector.
    pub sector: String,
    /// Fractional return.
    #[serde(rename = "return")]
    pub return_value: f64,
    /// Bars in the window.
    pub bar_count: usize,
    /// First close, exact decimal text.
    pub first_close: String,
    /// Last close, exact decimal text.
    pub last_close: String,
}

impl From<&ReturnRecord> for ResultItem {
    fn from(record: &ReturnRecord) -> Self {
        Self {
            ticker: record.symbol.clone(),
            sector: record.group.clone(),
            return_value: record.return_value,
            bar_count: record.bar_count,
            first_close: record.first_close.to_string(),
            last_close: record.last_close.to_string(),
        }
    }
}

/// One ranked sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorItem {
    /// Sector name.
    pub sector: String,
    /// Mean return of its members.
    pub avg_return: f64,
    /// Member count.
    pub ticker_count: usize,
}

impl From<&CategorySummary> for SectorItem {
    fn from(summary: &CategorySummary) -> Self {
        Self {
            sector: summary.group.clone(),
            avg_return: summary.average_return,
            ticker_count: summary.member_count,
        }
    }
}

/// Outcome of `/api/mtd`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MtdResponse {
    /// A snapshot was installed.
    Installed {
        /// Always `true`.
        success: bool,
        /// Correlation id of the refresh.
        refresh_id: Uuid,
        /// Window measured.
        window: DateWindow,
        /// Instruments in the snapshot.
        items: usize,
        /// Sectors in the snapshot.
        categories: usize,
        /// Instruments dropped with an error.
        failed: usize,
        /// Instruments abandoned by an interruption.
        abandoned: usize,
        /// Interruption reason for a partial snapshot.
        degraded: Option<String>,
    },
    /// The snapshot was left unchanged.
    Failed {
        /// Always `false`.
        success: bool,
        /// Why the refresh failed.
        error: String,
    },
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" once a snapshot is installed, "degraded" before.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Installed snapshot.
    pub snapshot: SnapshotStatus,
    /// Whether a refresh is executing.
    pub refresh_in_progress: bool,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving a snapshot.
    Healthy,
    /// Up, but nothing to serve yet.
    Degraded,
}

/// Installed snapshot summary.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStatus {
    /// "empty" or "fresh".
    pub state: &'static str,
    /// When the snapshot was built.
    pub generated_at: Option<DateTime<Utc>>,
    /// Instruments in the snapshot.
    pub items: usize,
    /// Sectors in the snapshot.
    pub categories: usize,
}

/// Raw `/api/mtd` parameters; validation is lenient so nothing is rejected here.
#[derive(Debug, Default, Deserialize)]
struct MtdQuery {
    year: Option<String>,
    month: Option<String>,
    day: Option<String>,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the HTTP server.
pub struct HttpServerState {
    version: String,
    started_at: Instant,
    controller: Arc<RefreshController>,
    cancel: CancellationToken,
}

impl HttpServerState {
    /// Create server state. Refreshes started over HTTP observe `cancel`.
    #[must_use]
    pub fn new(
        version: String,
        controller: Arc<RefreshController>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            controller,
            cancel,
        }
    }
}

// =============================================================================
// HTTP Server
// =============================================================================

/// HTTP server for the query surface.
pub struct HttpServer {
    port: u16,
    state: Arc<HttpServerState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HttpServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Bind the configured port and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if the HTTP server fails while running.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HttpServerError> {
        let local = listener
            .local_addr()
            .map_or_else(|_| self.port.to_string(), |a| a.to_string());
        tracing::info!(addr = %local, "HTTP server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the application router.
#[must_use]
pub fn router(state: Arc<HttpServerState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/results", get(results_handler))
        .route("/api/sectors", get(sectors_handler))
        .route("/api/mtd", get(mtd_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn index_handler(State(state): State<Arc<HttpServerState>>) -> Html<String> {
    Html(render_index(&state.controller.snapshot()))
}

async fn results_handler(State(state): State<Arc<HttpServerState>>) -> Json<Vec<ResultItem>> {
    let items = state
        .controller
        .snapshot()
        .result()
        .map(|set| set.items.iter().map(ResultItem::from).collect())
        .unwrap_or_default();
    Json(items)
}

async fn sectors_handler(State(state): State<Arc<HttpServerState>>) -> Json<Vec<SectorItem>> {
    let sectors = state
        .controller
        .snapshot()
        .result()
        .map(|set| set.categories.iter().map(SectorItem::from).collect())
        .unwrap_or_default();
    Json(sectors)
}

async fn mtd_handler(
    State(state): State<Arc<HttpServerState>>,
    Query(query): Query<MtdQuery>,
) -> Response {
    let params = RefreshParams::from_raw(
        query.year.as_deref(),
        query.month.as_deref(),
        query.day.as_deref(),
    );

    let controller = Arc::clone(&state.controller);
    let cancel = state.cancel.clone();
    let outcome = tokio::spawn(async move { controller.refresh(params, &cancel).await }).await;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Refresh task failed");
            let body = MtdResponse::Failed {
                success: false,
                error: format!("Failed to refresh data: {e}"),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }
    };

    match outcome {
        Ok(summary) => {
            let body = MtdResponse::Installed {
                success: true,
                refresh_id: summary.refresh_id,
                window: summary.result.window,
                items: summary.result.item_count(),
                categories: summary.result.category_count(),
                failed: summary.failed,
                abandoned: summary.abandoned,
                degraded: summary.degraded,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            let body = MtdResponse::Failed {
                success: false,
                error: format!("Failed to refresh data: {e}"),
            };
            (refresh_error_status(&e), Json(body)).into_response()
        }
    }
}

async fn health_handler(State(state): State<Arc<HttpServerState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(build_health_response(&state)))
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

const fn refresh_error_status(error: &RefreshError) -> StatusCode {
    if error.is_conflict() {
        StatusCode::CONFLICT
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn build_health_response(state: &HttpServerState) -> HealthResponse {
    let snapshot = match state.controller.snapshot() {
        CacheState::Empty => SnapshotStatus {
            state: "empty",
            generated_at: None,
            items: 0,
            categories: 0,
        },
        CacheState::Fresh(set) => SnapshotStatus {
            state: "fresh",
            generated_at: Some(set.generated_at),
            items: set.item_count(),
            categories: set.category_count(),
        },
    };

    let status = if snapshot.generated_at.is_some() {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        snapshot,
        refresh_in_progress: state.controller.is_refreshing(),
    }
}

// =============================================================================
// HTML Page
// =============================================================================

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>S&amp;P 500 Month-to-Date Returns</title>
<style>
body { font-family: sans-serif; margin: 2rem; }
table { border-collapse: collapse; margin-bottom: 2rem; }
th, td { padding: 0.25rem 0.75rem; border-bottom: 1px solid #ddd; text-align: left; }
td.num { text-align: right; font-variant-numeric: tabular-nums; }
.pos { color: #1a7f37; }
.neg { color: #cf222e; }
</style>
</head>
<body>
<h1>S&amp;P 500 Month-to-Date Returns</h1>
<form id="refresh" action="/api/mtd" method="get">
<label>Year <input name="year" type="number" min="1" size="6"></label>
<label>Month <input name="month" type="number" min="1" max="12" size="3"></label>
<label>Day <input name="day" type="number" min="1" max="31" size="3"></label>
<button type="submit">Refresh</button>
<span id="status"></span>
</form>
<script>
document.getElementById("refresh").addEventListener("submit", async (event) => {
  event.preventDefault();
  const params = new URLSearchParams(new FormData(event.target));
  const status = document.getElementById("status");
  status.textContent = "Refreshing...";
  const body = await (await fetch("/api/mtd?" + params)).json();
  if (body.success) { location.reload(); } else { status.textContent = body.error; }
});
</script>
"#;

const PAGE_TAIL: &str = "</body>\n</html>\n";

/// Render the results page for a cache state.
#[must_use]
pub fn render_index(state: &CacheState) -> String {
    let mut page = String::from(PAGE_HEAD);

    match state {
        CacheState::Empty => {
            page.push_str("<p>No results yet. Run a refresh to populate the table.</p>\n");
        }
        CacheState::Fresh(set) => render_result_set(&mut page, set),
    }

    page.push_str(PAGE_TAIL);
    page
}

fn render_result_set(page: &mut String, set: &ResultSet) {
    let _ = writeln!(
        page,
        "<p>Window {} &middot; generated {}</p>",
        escape_html(&set.window.to_string()),
        escape_html(&set.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    );

    page.push_str("<h2>Sectors</h2>\n<table>\n");
    page.push_str("<tr><th>#</th><th>Sector</th><th>Avg Return</th><th>Tickers</th></tr>\n");
    for (rank, category) in set.categories.iter().enumerate() {
        let _ = writeln!(
            page,
            "<tr><td>{}</td><td>{}</td><td class=\"num {}\">{:.2}%</td><td class=\"num\">{}</td></tr>",
            rank + 1,
            escape_html(&category.group),
            sign_class(category.average_return),
            category.average_return * 100.0,
            category.member_count,
        );
    }
    page.push_str("</table>\n");

    page.push_str("<h2>Tickers</h2>\n<table>\n");
    page.push_str(
        "<tr><th>#</th><th>Ticker</th><th>Sector</th><th>MTD</th><th>Bars</th><th>First</th><th>Last</th></tr>\n",
    );
    for (rank, record) in set.items.iter().enumerate() {
        let _ = writeln!(
            page,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num {}\">{:.2}%</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            rank + 1,
            escape_html(&record.symbol),
            escape_html(&record.group),
            sign_class(record.return_value),
            record.percent(),
            record.bar_count,
            record.first_close,
            record.last_close,
        );
    }
    page.push_str("</table>\n");
}

fn sign_class(value: f64) -> &'static str {
    if value < 0.0 { "neg" } else { "pos" }
}

/// Escape text for HTML element content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::executor::ExecutorError;
    use crate::application::ports::TickerSourceError;
    use crate::domain::instrument::{Instrument, PriceBar};
    use crate::domain::ranking::aggregate;
    use crate::domain::returns::compute;

    fn fresh() -> CacheState {
        let t0 = Utc.with_ymd_and_hms(2024, 2, 1, 21, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 2, 2, 21, 0, 0).unwrap();
        let bars = |a, b| [PriceBar::new(t0, a), PriceBar::new(t1, b)];
        let records = vec![
            compute(
                &Instrument::new("XOM", Some("Energy"), 10).unwrap(),
                bars(dec!(100), dec!(110)),
            )
            .unwrap(),
            compute(
                &Instrument::new("<b>", Some("R&D \"Labs\""), 10).unwrap(),
                bars(dec!(10), dec!(9)),
            )
            .unwrap(),
        ];
        let window = DateWindow::starting_at(2024, 2, 1).unwrap();
        CacheState::Fresh(Arc::new(aggregate(records, window, t1)))
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("Energy"), "Energy");
    }

    #[test]
    fn empty_page_has_form_and_placeholder() {
        let page = render_index(&CacheState::Empty);
        assert!(page.contains("action=\"/api/mtd\""));
        assert!(page.contains("No results yet"));
    }

    #[test]
    fn page_lists_ranked_rows_escaped() {
        let page = render_index(&fresh());

        assert!(page.contains("2024-02-01 to 2024-02-29"));
        assert!(page.contains("<td>XOM</td><td>Energy</td><td class=\"num pos\">10.00%</td>"));
        assert!(page.contains("<td>&lt;b&gt;</td><td>R&amp;D &quot;Labs&quot;</td>"));
        assert!(!page.contains("<td><b></td>"));

        let xom = page.find("<td>XOM</td>").unwrap();
        let other = page.find("<td>&lt;b&gt;</td>").unwrap();
        assert!(xom < other);
    }

    #[test]
    fn result_item_uses_return_key() {
        let CacheState::Fresh(set) = fresh() else {
            unreachable!()
        };
        let json = serde_json::to_value(ResultItem::from(&set.items[0])).unwrap();
        assert_eq!(json["ticker"], "XOM");
        assert_eq!(json["sector"], "Energy");
        assert_eq!(json["return"], 0.1);
        assert_eq!(json["bar_count"], 2);
        assert_eq!(json["first_close"], "100");
        assert_eq!(json["last_close"], "110");
    }

    #[test]
    fn failed_mtd_response_shape() {
        let body = MtdResponse::Failed {
            success: false,
            error: "boom".to_string(),
        };
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn installed_mtd_response_shape() {
        let refresh_id = Uuid::new_v4();
        let body = MtdResponse::Installed {
            success: true,
            refresh_id,
            window: DateWindow::starting_at(2024, 2, 1).unwrap(),
            items: 2,
            categories: 2,
            failed: 1,
            abandoned: 0,
            degraded: None,
        };
        let json = serde_json::to_value(body).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["refresh_id"], refresh_id.to_string());
        assert_eq!(json["window"]["start"], "2024-02-01");
        assert_eq!(json["window"]["end"], "2024-02-29");
        assert_eq!(json["items"], 2);
        assert_eq!(json["failed"], 1);
        assert!(json["degraded"].is_null());
    }

    #[test]
    fn conflict_maps_to_409() {
        assert_eq!(
            refresh_error_status(&RefreshError::AlreadyRunning),
            StatusCode::CONFLICT
        );
        assert_eq!(
            refresh_error_status(&RefreshError::TickerSource(TickerSourceError::NoInstruments)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            refresh_error_status(&RefreshError::Interrupted(ExecutorError::Cancelled)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

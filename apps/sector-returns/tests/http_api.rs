//! HTTP Query Surface Integration Tests
//!
//! Drives the router with in-memory collaborators, and one live server
//! bound to a random port to cover start and graceful stop.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use sector_returns::application::ports::{MarketDataError, NoOpExporter};
use sector_returns::infrastructure::http::router;
use sector_returns::infrastructure::memory::{InMemoryMarketData, StaticTickerSource};
use sector_returns::{
    ConcurrencyPolicy, HttpServer, HttpServerState, Instrument, RefreshController,
    RefreshSettings,
};

fn instrument(symbol: &str, sector: &str) -> Instrument {
    Instrument::new(symbol, Some(sector), 10).unwrap()
}

fn scenario_tickers() -> StaticTickerSource {
    StaticTickerSource::new(vec![
        instrument("AAPL", "Information Technology"),
        instrument("XOM", "Energy"),
        instrument("CVX", "Energy"),
    ])
}

fn scenario_market() -> InMemoryMarketData {
    InMemoryMarketData::new()
        .with_closes("AAPL", &[dec!(100), dec!(99), dec!(98)])
        .with_closes("XOM", &[dec!(100), dec!(105), dec!(110)])
        .with_closes("CVX", &[dec!(50), dec!(51), dec!(53)])
}

fn controller_with(
    tickers: StaticTickerSource,
    market: InMemoryMarketData,
    settings: RefreshSettings,
) -> Arc<RefreshController> {
    Arc::new(RefreshController::new(
        Arc::new(tickers),
        Arc::new(market),
        Arc::new(NoOpExporter),
        settings,
    ))
}

fn state(controller: &Arc<RefreshController>) -> Arc<HttpServerState> {
    Arc::new(HttpServerState::new(
        "test-0.0.1".to_string(),
        Arc::clone(controller),
        CancellationToken::new(),
    ))
}

async fn get(state: &Arc<HttpServerState>, uri: &str) -> (StatusCode, String) {
    let response = router(Arc::clone(state))
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_json(state: &Arc<HttpServerState>, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(state, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn results_empty_before_first_refresh() {
    let controller = controller_with(
        scenario_tickers(),
        scenario_market(),
        RefreshSettings::default(),
    );
    let state = state(&controller);

    let (status, body) = get_json(&state, "/api/results").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));

    let (status, body) = get_json(&state, "/api/sectors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn mtd_refresh_then_results_are_ranked() {
    let controller = controller_with(
        scenario_tickers(),
        scenario_market(),
        RefreshSettings::default(),
    );
    let state = state(&controller);

    let (status, body) = get_json(&state, "/api/mtd?year=2024&month=2&day=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["window"]["start"], "2024-02-01");
    assert_eq!(body["window"]["end"], "2024-02-29");
    assert_eq!(body["items"], 3);
    assert_eq!(body["categories"], 2);
    assert_eq!(body["failed"], 0);
    assert!(body["degraded"].is_null());
    assert!(body["refresh_id"].is_string());

    let (_, results) = get_json(&state, "/api/results").await;
    let tickers: Vec<&str> = results
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ticker"].as_str().unwrap())
        .collect();
    assert_eq!(tickers, vec!["XOM", "CVX", "AAPL"]);
    assert_eq!(results[0]["sector"], "Energy");
    assert_eq!(results[0]["return"], 0.1);
    assert_eq!(results[0]["bar_count"], 3);
    assert_eq!(results[0]["first_close"], "100");
    assert_eq!(results[0]["last_close"], "110");

    let (_, sectors) = get_json(&state, "/api/sectors").await;
    assert_eq!(sectors[0]["sector"], "Energy");
    assert_eq!(sectors[0]["avg_return"], 0.08);
    assert_eq!(sectors[0]["ticker_count"], 2);
    assert_eq!(sectors[1]["sector"], "Information Technology");
}

#[tokio::test]
async fn invalid_params_are_ignored_not_rejected() {
    let controller = controller_with(
        scenario_tickers(),
        scenario_market(),
        RefreshSettings::default(),
    );
    let state = state(&controller);

    let (status, body) = get_json(&state, "/api/mtd?year=abc&month=13&day=-4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    // Falls back to the previous calendar month, which always starts on the 1st.
    assert!(body["window"]["start"].as_str().unwrap().ends_with("-01"));
}

#[tokio::test]
async fn failed_refresh_reports_error_and_keeps_results() {
    let tickers = scenario_tickers();
    let controller = controller_with(
        tickers.clone(),
        scenario_market(),
        RefreshSettings::default(),
    );
    let state = state(&controller);

    let (_, first) = get_json(&state, "/api/mtd").await;
    assert_eq!(first["success"], true);

    tickers.set_instruments(Vec::new());
    let (status, body) = get_json(&state, "/api/mtd").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Failed to refresh data"));

    let (status, results) = get_json(&state, "/api/results").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn overlapping_refresh_rejected_with_conflict() {
    let settings = RefreshSettings {
        policy: ConcurrencyPolicy::Reject,
        ..RefreshSettings::default()
    };
    let controller = controller_with(
        scenario_tickers(),
        scenario_market().with_latency(Duration::from_millis(300)),
        settings,
    );
    let state = state(&controller);

    let background = {
        let state = Arc::clone(&state);
        tokio::spawn(async move { get_json(&state, "/api/mtd").await })
    };

    while !controller.is_refreshing() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, body) = get_json(&state, "/api/mtd").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, first) = background.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
}

#[tokio::test]
async fn refresh_survives_client_disconnect() {
    let controller = controller_with(
        scenario_tickers(),
        scenario_market().with_latency(Duration::from_millis(300)),
        RefreshSettings::default(),
    );
    let state = state(&controller);

    let gave_up = tokio::time::timeout(
        Duration::from_millis(50),
        get_json(&state, "/api/mtd?year=2024&month=2&day=1"),
    )
    .await;
    assert!(gave_up.is_err());

    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.snapshot().result().is_none() || controller.is_refreshing() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("refresh completes after the caller went away");

    let snapshot = controller.snapshot();
    let set = snapshot.result().unwrap();
    assert_eq!(set.item_count(), 3);
    assert_eq!(set.window.start().to_string(), "2024-02-01");
}

#[tokio::test]
async fn health_reports_snapshot_state() {
    let controller = controller_with(
        scenario_tickers(),
        scenario_market(),
        RefreshSettings::default(),
    );
    let state = state(&controller);

    let (status, before) = get_json(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["status"], "degraded");
    assert_eq!(before["version"], "test-0.0.1");
    assert_eq!(before["snapshot"]["state"], "empty");
    assert!(before["snapshot"]["generated_at"].is_null());
    assert_eq!(before["refresh_in_progress"], false);

    get_json(&state, "/api/mtd").await;

    let (_, after) = get_json(&state, "/health").await;
    assert_eq!(after["status"], "healthy");
    assert_eq!(after["snapshot"]["state"], "fresh");
    assert_eq!(after["snapshot"]["items"], 3);
    assert_eq!(after["snapshot"]["categories"], 2);
    assert!(after["snapshot"]["generated_at"].is_string());
}

#[tokio::test]
async fn index_page_renders_snapshot() {
    let market = scenario_market().with_failure(
        "AAPL",
        MarketDataError::DataUnavailable {
            message: "halted".to_string(),
        },
    );
    let controller = controller_with(scenario_tickers(), market, RefreshSettings::default());
    let state = state(&controller);

    let (status, empty) = get(&state, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(empty.contains("No results yet"));

    get_json(&state, "/api/mtd?year=2024&month=2").await;

    let (_, page) = get(&state, "/").await;
    assert!(page.contains("2024-02-01 to 2024-02-29"));
    assert!(page.contains("<td>XOM</td>"));
    assert!(page.contains("<td>CVX</td>"));
    assert!(!page.contains("<td>AAPL</td>"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let controller = controller_with(
        scenario_tickers(),
        scenario_market(),
        RefreshSettings::default(),
    );
    let (status, _) = get(&state(&controller), "/api/unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn live_server_serves_until_cancelled() {
    let controller = controller_with(
        scenario_tickers(),
        scenario_market(),
        RefreshSettings::default(),
    );
    let cancel = CancellationToken::new();
    let state = Arc::new(HttpServerState::new(
        "test-0.0.1".to_string(),
        Arc::clone(&controller),
        cancel.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(addr.port(), state, cancel.clone());
    let handle = tokio::spawn(server.serve(listener));

    let body: Value = reqwest::get(format!("http://{addr}/api/results"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, serde_json::json!([]));

    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server stops after cancellation")
        .unwrap();
    assert!(result.is_ok());
}

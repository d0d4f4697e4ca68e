//! Wikipedia Constituents Ticker Source
//!
//! Implements `TickerSourcePort` by scraping the S&P 500 constituents table
//! from Wikipedia. The first column holds the symbol (usually a link), the
//! third the GICS sector.
//!
//! Header rows, blank symbols, the literal `Symbol`, and over-long symbols are
//! skipped. Data rows too short to carry a sector are malformed; each scrape
//! tolerates a bounded number of them before giving up.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::application::ports::{TickerSourceError, TickerSourcePort};
use crate::domain::instrument::Instrument;

/// User agent sent with scrape requests.
const USER_AGENT: &str = concat!("sector-returns/", env!("CARGO_PKG_VERSION"));

/// Columns a data row needs: symbol, security name, sector.
const MIN_CELLS: usize = 3;

// =============================================================================
// Adapter
// =============================================================================

/// Ticker source backed by the Wikipedia constituents page.
#[derive(Debug, Clone)]
pub struct WikipediaTickerSource {
    client: reqwest::Client,
    url: String,
    max_symbol_len: usize,
    max_scrape_errors: usize,
}

impl WikipediaTickerSource {
    /// Create a new source.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        url: impl Into<String>,
        max_symbol_len: usize,
        max_scrape_errors: usize,
        timeout: Duration,
    ) -> Result<Self, TickerSourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TickerSourceError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.into(),
            max_symbol_len,
            max_scrape_errors,
        })
    }
}

#[async_trait]
impl TickerSourcePort for WikipediaTickerSource {
    async fn instruments(&self) -> Result<Vec<Instrument>, TickerSourceError> {
        info!(url = %self.url, "Fetching constituents");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            TickerSourceError::ConnectionError {
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TickerSourceError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TickerSourceError::ConnectionError {
                message: e.to_string(),
            })?;

        let instruments = parse_constituents(&body, self.max_symbol_len, self.max_scrape_errors)?;
        info!(count = instruments.len(), "Found constituents");
        Ok(instruments)
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Malformed-row accounting for a single scrape.
#[derive(Debug)]
struct ScrapeContext {
    errors: usize,
    limit: usize,
}

impl ScrapeContext {
    const fn new(limit: usize) -> Self {
        Self { errors: 0, limit }
    }

    fn malformed(&mut self, row: usize, reason: &str) -> Result<(), TickerSourceError> {
        self.errors += 1;
        warn!(
            row,
            reason,
            errors = self.errors,
            limit = self.limit,
            "Malformed constituents row"
        );
        if self.errors > self.limit {
            return Err(TickerSourceError::TooManyErrors {
                count: self.errors,
                limit: self.limit,
            });
        }
        Ok(())
    }
}

/// Extract instruments from the constituents page HTML.
///
/// # Errors
///
/// Returns error if no suitable table exists, malformed rows exceed
/// `max_errors`, or no instrument was found.
pub fn parse_constituents(
    html: &str,
    max_symbol_len: usize,
    max_errors: usize,
) -> Result<Vec<Instrument>, TickerSourceError> {
    let patterns = patterns();
    let table = patterns
        .constituents_table
        .captures(html)
        .or_else(|| patterns.wikitable.captures(html))
        .and_then(|c| c.get(1))
        .ok_or_else(|| TickerSourceError::ParseError {
            message: "constituents table not found".to_string(),
        })?
        .as_str();

    let mut context = ScrapeContext::new(max_errors);
    let mut instruments = Vec::new();

    for (row_index, row) in patterns.row.captures_iter(table).enumerate() {
        let Some(row_html) = row.get(1).map(|m| m.as_str()) else {
            continue;
        };

        let cells: Vec<&str> = patterns
            .data_cell
            .captures_iter(row_html)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        // Header rows carry only <th> cells.
        if cells.is_empty() {
            continue;
        }

        if cells.len() < MIN_CELLS {
            context.malformed(row_index, "too few cells")?;
            continue;
        }

        let symbol = patterns
            .link
            .captures(cells[0])
            .and_then(|c| c.get(1))
            .map(|m| cell_text(m.as_str()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| cell_text(cells[0]));

        if symbol.is_empty() || symbol == "Symbol" {
            continue;
        }

        let sector = cell_text(cells[2]);
        match Instrument::new(&symbol, Some(&sector), max_symbol_len) {
            Ok(instrument) => instruments.push(instrument),
            Err(e) => debug!(symbol = %symbol, error = %e, "Skipping symbol"),
        }
    }

    if instruments.is_empty() {
        return Err(TickerSourceError::NoInstruments);
    }

    Ok(instruments)
}

/// Strip tags, decode common entities, collapse whitespace.
fn cell_text(html: &str) -> String {
    let stripped = patterns().tag.replace_all(html, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Patterns {
    constituents_table: Regex,
    wikitable: Regex,
    row: Regex,
    data_cell: Regex,
    link: Regex,
    tag: Regex,
}

#[allow(clippy::expect_used)] // Patterns are compile-time constants; expect() is safe here
fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();

    PATTERNS.get_or_init(|| Patterns {
        constituents_table: Regex::new(
            r#"(?is)<table[^>]*\bid="constituents"[^>]*>(.*?)</table>"#,
        )
        .expect("constituents table regex is valid"),
        wikitable: Regex::new(
            r#"(?is)<table[^>]*\bclass="[^"]*\bwikitable\b[^"]*"[^>]*>(.*?)</table>"#,
        )
        .expect("wikitable regex is valid"),
        row: Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("row regex is valid"),
        data_cell: Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").expect("cell regex is valid"),
        link: Regex::new(r"(?is)<a\b[^>]*>(.*?)</a>").expect("link regex is valid"),
        tag: Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            r#"<html><body>
            <table class="wikitable sortable" id="constituents">
            <tbody>
            <tr><th>Symbol</th><th>Security</th><th>GICS Sector</th><th>GICS Sub-Industry</th></tr>
            {rows}
            </tbody>
            </table>
            <table class="wikitable"><tr><td>OTHER</td><td>x</td><td>y</td></tr></table>
            </body></html>"#
        )
    }

    #[test]
    fn parses_symbols_and_sectors() {
        let html = page(
            r#"<tr><td><a rel="nofollow" class="external text" href="https://www.nyse.com/quote/XNYS:MMM">MMM</a></td><td><a href="/wiki/3M">3M</a></td><td>Industrials</td><td>Industrial Conglomerates</td></tr>
            <tr><td><a href="x">BRK.B</a></td><td>Berkshire Hathaway</td><td>Financials</td><td>Multi-Sector Holdings</td></tr>
            <tr><td>XOM
            </td><td>Exxon Mobil</td><td>Energy</td><td>Integrated Oil &amp; Gas</td></tr>"#,
        );

        let instruments = parse_constituents(&html, 10, 20).unwrap();
        let pairs: Vec<(&str, &str)> = instruments
            .iter()
            .map(|i| (i.symbol(), i.group()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("MMM", "Industrials"),
                ("BRK.B", "Financials"),
                ("XOM", "Energy"),
            ]
        );
    }

    #[test]
    fn entities_decoded_in_sector() {
        let html =
            page(r"<tr><td>T</td><td>AT&amp;T</td><td>Communication&nbsp;Services</td></tr>");
        let instruments = parse_constituents(&html, 10, 20).unwrap();
        assert_eq!(instruments[0].group(), "Communication Services");
    }

    #[test]
    fn skips_symbol_literal_blank_and_long() {
        let html = page(
            r"<tr><td>Symbol</td><td>x</td><td>y</td></tr>
            <tr><td>  </td><td>x</td><td>y</td></tr>
            <tr><td>WAYTOOLONGSYM</td><td>x</td><td>y</td></tr>
            <tr><td>AAPL</td><td>Apple</td><td>Information Technology</td></tr>",
        );
        let instruments = parse_constituents(&html, 10, 0).unwrap();
        assert_eq!(instruments.len(), 1);
        assert_eq!(instruments[0].symbol(), "AAPL");
    }

    #[test]
    fn blank_sector_is_unknown() {
        let html = page(r"<tr><td>NEW</td><td>Newco</td><td> </td></tr>");
        let instruments = parse_constituents(&html, 10, 20).unwrap();
        assert_eq!(instruments[0].group(), "Unknown");
    }

    #[test]
    fn malformed_rows_within_limit_are_skipped() {
        let html = page(
            r"<tr><td>BAD</td></tr>
            <tr><td>CVX</td><td>Chevron</td><td>Energy</td></tr>",
        );
        let instruments = parse_constituents(&html, 10, 1).unwrap();
        assert_eq!(instruments.len(), 1);
    }

    #[test]
    fn malformed_rows_past_limit_abort() {
        let html = page(
            r"<tr><td>A</td></tr>
            <tr><td>B</td></tr>
            <tr><td>C</td></tr>
            <tr><td>CVX</td><td>Chevron</td><td>Energy</td></tr>",
        );
        let err = parse_constituents(&html, 10, 2).unwrap_err();
        assert_eq!(err, TickerSourceError::TooManyErrors { count: 3, limit: 2 });
    }

    #[test]
    fn error_counter_is_per_call() {
        let html = page(
            r"<tr><td>A</td></tr>
            <tr><td>CVX</td><td>Chevron</td><td>Energy</td></tr>",
        );
        for _ in 0..5 {
            assert!(parse_constituents(&html, 10, 1).is_ok());
        }
    }

    #[test]
    fn falls_back_to_first_wikitable() {
        let html = r#"<table class="wikitable sortable"><tr><td>KO</td><td>Coca-Cola</td><td>Consumer Staples</td></tr></table>"#;
        let instruments = parse_constituents(html, 10, 20).unwrap();
        assert_eq!(instruments[0].symbol(), "KO");
    }

    #[test]
    fn missing_table_is_parse_error() {
        let err = parse_constituents("<html></html>", 10, 20).unwrap_err();
        assert!(matches!(err, TickerSourceError::ParseError { .. }));
    }

    #[test]
    fn empty_table_is_no_instruments() {
        let err = parse_constituents(&page(""), 10, 20).unwrap_err();
        assert_eq!(err, TickerSourceError::NoInstruments);
    }
}

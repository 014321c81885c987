//! Retail quote provider: daily bars from the v8 chart API.
//!
//! One request per symbol, no retries. The API is unofficial and its format
//! can change without notice; parse failures surface as `MalformedSource`.

use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use super::provider::{DailyPriceSource, DataError, FetchResult, RawBar};
use crate::config::{HttpConfig, YahooConfig};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(config: &YahooConfig, http: &HttpConfig) -> Result<Self, DataError> {
        Ok(Self {
            client: http.client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The symbol becomes a single percent-encoded path segment, so index
    /// tickers like `^GSPC` and class shares like `BRK/B` stay intact.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Url, DataError> {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        // Through the end of the last requested day.
        let end_ts = start_ts.max(
            end.and_time(chrono::NaiveTime::MIN).and_utc().timestamp() + 86_399,
        );

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DataError::Validation(format!("invalid chart url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| DataError::Validation(format!("chart url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("period1", &start_ts.to_string())
            .append_pair("period2", &end_ts.to_string())
            .append_pair("interval", "1d")
            .append_pair("includeAdjustedClose", "true");
        Ok(url)
    }
}

/// Parse a chart API body into daily bars.
pub fn parse_chart(symbol: &str, body: &str) -> Result<Vec<RawBar>, DataError> {
    let resp: ChartResponse = serde_json::from_str(body).map_err(|e| {
        DataError::MalformedSource(format!("failed to parse chart response for {symbol}: {e}"))
    })?;
    parse_response(symbol, resp)
}

fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<RawBar>, DataError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        },
        Some(err) => DataError::MalformedSource(format!("{}: {}", err.code, err.description)),
        None => DataError::MalformedSource("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;

    // A symbol with no trading history comes back without timestamps.
    let Some(timestamps) = data.timestamp else {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::MalformedSource("no quote data".into()))?;

    let adj_closes = data
        .indicators
        .adjclose
        .and_then(|v| v.into_iter().next())
        .map(|a| a.adjclose);

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = chrono::DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.naive_utc().date())
            .ok_or_else(|| DataError::MalformedSource(format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();
        let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

        // Holidays come back as all-null rows.
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() && volume.is_none() {
            continue;
        }

        bars.push(RawBar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close: close.unwrap_or(f64::NAN),
            volume: volume.unwrap_or(0),
            adj_close: adj_close.unwrap_or(f64::NAN),
        });
    }

    if bars.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(bars)
}

impl DailyPriceSource for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<FetchResult, DataError> {
        let url = self.chart_url(symbol, start, end)?;
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!(event_type = "symbol_not_found", symbol = %symbol, "Chart API returned 404");
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }
        let body = resp.error_for_status()?.text()?;
        let bars = parse_chart(symbol, &body)?;

        debug!(
            event_type = "download_complete",
            source = self.name(),
            symbol = %symbol,
            bars = bars.len(),
            "Fetched daily bars"
        );
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
        })
    }
}

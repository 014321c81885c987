//! Market-data API: monthly adjusted time series.
//!
//! The response body is a JSON object whose `"Monthly Adjusted Time Series"`
//! section maps ISO dates to seven numbered string fields
//! (`"1. open"` .. `"7. dividend amount"`).

use serde_json::Value;
use tracing::{debug, info};

use super::provider::DataError;
use crate::config::{AlphaVantageConfig, HttpConfig};
use crate::domain::{DateRange, MonthlyTable, Period};

/// Key of the data-bearing section.
pub const SERIES_KEY: &str = "Monthly Adjusted Time Series";

/// Canonical column names, in field-number order.
pub const COLUMNS: [&str; 7] = [
    "Open",
    "High",
    "Low",
    "Close",
    "Adjusted Close",
    "Volume",
    "Dividend Amount",
];

/// Normalize a parsed response body.
pub fn normalize_monthly_adjusted(body: &Value, range: &DateRange) -> Result<MonthlyTable, DataError> {
    let series = body
        .get(SERIES_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| missing_section(body))?;

    let mut rows = Vec::with_capacity(series.len());
    for (date, fields) in series {
        let period = Period::parse(date)?;
        let fields = fields.as_object().ok_or_else(|| {
            DataError::MalformedSource(format!("entry for {date} is not an object"))
        })?;

        // Keys carry their field number as a prefix; order by it.
        let mut ordered: Vec<(&String, &Value)> = fields.iter().collect();
        ordered.sort_by_key(|(k, _)| field_number(k));
        if ordered.len() != COLUMNS.len() {
            return Err(DataError::MalformedSource(format!(
                "entry for {date} has {} fields, expected {}",
                ordered.len(),
                COLUMNS.len()
            )));
        }

        let values = ordered.into_iter().map(|(_, v)| coerce(v)).collect();
        rows.push((period, values));
    }

    let table = MonthlyTable::from_rows(COLUMNS.iter().map(|c| c.to_string()).collect(), rows)?;
    debug!(
        event_type = "normalized",
        source = "alpha_vantage",
        rows = table.len(),
        "Normalized monthly adjusted series"
    );
    Ok(table.filter(range))
}

/// Parse and normalize a raw response body.
pub fn parse_monthly_adjusted(body: &str, range: &DateRange) -> Result<MonthlyTable, DataError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| DataError::MalformedSource(format!("response is not JSON: {e}")))?;
    normalize_monthly_adjusted(&value, range)
}

fn missing_section(body: &Value) -> DataError {
    for key in ["Error Message", "Note", "Information"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            return DataError::MalformedSource(format!("'{SERIES_KEY}' missing; provider said: {msg}"));
        }
    }
    DataError::MalformedSource(format!("'{SERIES_KEY}' missing from response"))
}

fn field_number(key: &str) -> u32 {
    key.split('.')
        .next()
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(u32::MAX)
}

fn coerce(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Blocking client for the monthly adjusted endpoint.
pub struct AlphaVantageClient {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AlphaVantageClient {
    pub fn new(config: &AlphaVantageConfig, http: &HttpConfig) -> Result<Self, DataError> {
        Ok(Self {
            client: http.client()?,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Override the configured key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Fetch and normalize the monthly adjusted series for `symbol`.
    pub fn fetch_monthly_adjusted(&self, symbol: &str, range: &DateRange) -> Result<MonthlyTable, DataError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DataError::Validation("an API key is required".into()))?;

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_MONTHLY_ADJUSTED"),
                ("symbol", symbol),
                ("apikey", key),
            ])
            .send()?
            .error_for_status()?;
        let body = resp.text()?;

        info!(
            event_type = "download_complete",
            source = "alpha_vantage",
            symbol = %symbol,
            bytes = body.len(),
            "Downloaded monthly adjusted series"
        );
        parse_monthly_adjusted(&body, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(close: &str) -> Value {
        json!({
            "1. open": "10.0",
            "2. high": "12.5",
            "3. low": "9.5",
            "4. close": close,
            "5. adjusted close": "11.9",
            "6. volume": "123456",
            "7. dividend amount": "0.0000"
        })
    }

    fn body() -> Value {
        json!({
            "Meta Data": { "2. Symbol": "IBM" },
            "Monthly Adjusted Time Series": {
                "2024-03-28": entry("12.0"),
                "2024-01-31": entry("11.0"),
                "2024-02-29": entry("n/a"),
            }
        })
    }

    #[test]
    fn maps_numbered_fields_and_sorts_by_month() {
        let t = normalize_monthly_adjusted(&body(), &DateRange::all()).unwrap();
        assert_eq!(t.columns().len(), 7);
        assert_eq!(t.columns()[4], "Adjusted Close");
        let idx: Vec<String> = t.index().iter().map(|p| p.to_string()).collect();
        assert_eq!(idx, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(t.column("Close").unwrap()[0], 11.0);
        assert!(t.column("Close").unwrap()[1].is_nan());
        assert_eq!(t.column("Volume").unwrap()[2], 123456.0);
    }

    #[test]
    fn filters_inclusive_range() {
        let range = DateRange::parse(Some("2024-02"), None).unwrap();
        let t = normalize_monthly_adjusted(&body(), &range).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.first_period().unwrap().to_string(), "2024-02");
    }

    #[test]
    fn missing_section_is_malformed_and_quotes_provider() {
        let err = normalize_monthly_adjusted(
            &json!({"Note": "Thank you for using Alpha Vantage!"}),
            &DateRange::all(),
        )
        .unwrap_err();
        match err {
            DataError::MalformedSource(msg) => assert!(msg.contains("Thank you")),
            other => panic!("expected MalformedSource, got {other:?}"),
        }
        assert!(matches!(
            parse_monthly_adjusted("not json", &DateRange::all()),
            Err(DataError::MalformedSource(_))
        ));
    }

    #[test]
    fn short_entry_is_malformed() {
        let body = json!({ "Monthly Adjusted Time Series": { "2024-01-31": { "1. open": "1" } } });
        assert!(matches!(
            normalize_monthly_adjusted(&body, &DateRange::all()),
            Err(DataError::MalformedSource(_))
        ));
    }
}

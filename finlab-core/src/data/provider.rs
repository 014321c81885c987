//! Source traits and structured error types for the data pipelines.
//!
//! Each external collaborator (relational database, factor-data archive,
//! daily quote API) sits behind a small trait so the normalizers can be
//! driven by HTTP clients in production and by in-memory fixtures in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::batcher::PanelQuery;
use super::factor_library::Dataset;
use crate::domain::PanelRow;

/// Raw daily bar from a quote provider (before month-end resampling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("malformed source: {0}")]
    MalformedSource(String),

    #[error("unsupported strategy '{0}'. Valid: beta, momentum, shorttermreversal, accruals")]
    UnsupportedStrategy(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },
}

impl From<csv::Error> for DataError {
    fn from(e: csv::Error) -> Self {
        DataError::Csv(e.to_string())
    }
}

impl From<zip::result::ZipError> for DataError {
    fn from(e: zip::result::ZipError) -> Self {
        DataError::Archive(e.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(e: reqwest::Error) -> Self {
        match (e.status(), e.url()) {
            (Some(status), Some(url)) => DataError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            },
            _ => DataError::Network(e.to_string()),
        }
    }
}

/// Relational source of monthly security observations.
///
/// Implemented by whatever database handle the caller holds. Each call runs
/// one read-only query and returns its rows; the batcher never retries.
pub trait PanelSource {
    fn execute(&mut self, query: &PanelQuery) -> Result<Vec<PanelRow>, DataError>;
}

/// Source of the delimited text files published in the factor-data library.
pub trait FactorSource {
    /// Fetch the text of the dataset's single archive member.
    fn fetch_text(&self, dataset: &Dataset) -> Result<String, DataError>;
}

/// Result of a successful daily price fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
}

/// Source of daily price history (retail quote provider).
pub trait DailyPriceSource {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol over an inclusive date range.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;
}

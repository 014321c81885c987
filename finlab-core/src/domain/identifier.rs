//! Security identifiers for batch queries.
//!
//! A batch holds identifiers of exactly one kind. The kind is decided once,
//! when the batch is classified, and travels with the batch from then on.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::DataError;

/// One identifier as supplied by a caller: an integer or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawIdentifier {
    Int(i64),
    Text(String),
}

impl From<i64> for RawIdentifier {
    fn from(v: i64) -> Self {
        RawIdentifier::Int(v)
    }
}

impl From<i32> for RawIdentifier {
    fn from(v: i32) -> Self {
        RawIdentifier::Int(i64::from(v))
    }
}

impl From<u32> for RawIdentifier {
    fn from(v: u32) -> Self {
        RawIdentifier::Int(i64::from(v))
    }
}

impl From<&str> for RawIdentifier {
    fn from(v: &str) -> Self {
        RawIdentifier::Text(v.to_string())
    }
}

impl From<String> for RawIdentifier {
    fn from(v: String) -> Self {
        RawIdentifier::Text(v)
    }
}

impl fmt::Display for RawIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawIdentifier::Int(v) => write!(f, "{v}"),
            RawIdentifier::Text(s) => write!(f, "{s}"),
        }
    }
}

impl RawIdentifier {
    fn is_numeric_like(&self) -> bool {
        match self {
            RawIdentifier::Int(_) => true,
            RawIdentifier::Text(s) => {
                let t = s.trim();
                !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit())
            }
        }
    }
}

/// Which identifier column a batch filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Internal numeric security code.
    Permno,
    /// Exchange ticker symbol.
    Ticker,
}

/// A classified, normalized identifier list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierBatch {
    Permnos(Vec<i64>),
    Tickers(Vec<String>),
}

impl IdentifierBatch {
    /// Classify and normalize a caller-supplied identifier list.
    ///
    /// Numeric when every element is an integer or an all-digit string.
    /// Otherwise the batch is tickers, and an integer anywhere in it makes it
    /// mixed-kind.
    pub fn classify(ids: &[RawIdentifier]) -> Result<Self, DataError> {
        if ids.is_empty() {
            return Err(DataError::EmptyInput("identifier list is empty".into()));
        }

        if ids.iter().all(RawIdentifier::is_numeric_like) {
            let mut permnos = Vec::with_capacity(ids.len());
            for id in ids {
                let value = match id {
                    RawIdentifier::Int(v) => *v,
                    RawIdentifier::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                        DataError::InvalidIdentifier(format!("'{s}' does not fit a numeric id"))
                    })?,
                };
                if value < 0 {
                    return Err(DataError::InvalidIdentifier(format!(
                        "numeric id {value} is negative"
                    )));
                }
                permnos.push(value);
            }
            return Ok(IdentifierBatch::Permnos(permnos));
        }

        let mut tickers = Vec::with_capacity(ids.len());
        for id in ids {
            match id {
                RawIdentifier::Int(v) => {
                    return Err(DataError::InvalidIdentifier(format!(
                        "mixed identifier kinds: numeric id {v} in a ticker batch"
                    )));
                }
                RawIdentifier::Text(s) => {
                    let ticker = s.trim().to_uppercase();
                    if ticker.is_empty() {
                        return Err(DataError::InvalidIdentifier("empty ticker".into()));
                    }
                    if ticker.contains('\'') || ticker.contains('"') {
                        return Err(DataError::InvalidIdentifier(format!(
                            "ticker {ticker} contains a quote character"
                        )));
                    }
                    tickers.push(ticker);
                }
            }
        }
        Ok(IdentifierBatch::Tickers(tickers))
    }

    pub fn kind(&self) -> IdentifierKind {
        match self {
            IdentifierBatch::Permnos(_) => IdentifierKind::Permno,
            IdentifierBatch::Tickers(_) => IdentifierKind::Ticker,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IdentifierBatch::Permnos(v) => v.len(),
            IdentifierBatch::Tickers(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into consecutive sub-batches of at most `size` identifiers.
    /// `size` must be non-zero.
    pub fn chunks(&self, size: usize) -> Vec<IdentifierBatch> {
        match self {
            IdentifierBatch::Permnos(v) => v
                .chunks(size)
                .map(|c| IdentifierBatch::Permnos(c.to_vec()))
                .collect(),
            IdentifierBatch::Tickers(v) => v
                .chunks(size)
                .map(|c| IdentifierBatch::Tickers(c.to_vec()))
                .collect(),
        }
    }
}

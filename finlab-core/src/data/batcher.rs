//! Identifier-driven batch queries against a relational monthly stock file.
//!
//! The identifier list is classified once, split into chunks of bounded
//! size, and each chunk becomes one read-only query. Chunks run strictly in
//! sequence; their rows are concatenated and sorted into a [`PanelTable`].

use chrono::NaiveDate;
use tracing::{debug, info};

use super::provider::{DataError, PanelSource};
use crate::config::CrspConfig;
use crate::domain::{IdentifierBatch, IdentifierKind, PanelTable, Period, RawIdentifier};

/// Identifiers per query when the caller does not choose.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// One rendered chunk query.
///
/// `sql` is ready to run as-is; the structured fields are kept so a driver
/// can bind parameters instead of executing the literal text.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelQuery {
    pub sql: String,
    pub identifiers: IdentifierBatch,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl PanelQuery {
    pub fn kind(&self) -> IdentifierKind {
        self.identifiers.kind()
    }
}

/// Renders chunk queries against configurable table names.
#[derive(Debug, Clone)]
pub struct PanelQueryBuilder {
    monthly_table: String,
    names_table: String,
    chunk_size: usize,
}

impl Default for PanelQueryBuilder {
    fn default() -> Self {
        Self::from_config(&CrspConfig::default())
    }
}

impl PanelQueryBuilder {
    pub fn new(monthly_table: impl Into<String>, names_table: impl Into<String>) -> Self {
        Self {
            monthly_table: monthly_table.into(),
            names_table: names_table.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn from_config(config: &CrspConfig) -> Self {
        Self::new(&config.monthly_table, &config.names_table).with_chunk_size(config.chunk_size)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Render the query for one chunk. Ticker text has already been checked
    /// for quote characters by [`IdentifierBatch::classify`].
    pub fn build(&self, chunk: &IdentifierBatch, first_day: NaiveDate, last_day: NaiveDate) -> PanelQuery {
        let id_filter = match chunk {
            IdentifierBatch::Permnos(ids) => {
                let list: Vec<String> = ids.iter().map(i64::to_string).collect();
                format!("a.permno IN ({})", list.join(","))
            }
            IdentifierBatch::Tickers(ids) => {
                let list: Vec<String> = ids.iter().map(|t| format!("'{t}'")).collect();
                format!("b.ticker IN ({})", list.join(","))
            }
        };

        let sql = format!(
            "SELECT a.date, a.permno, a.permco, b.ticker, b.comnam, b.shrcd, b.exchcd, b.siccd, \
             a.prc, a.ret, a.retx, a.vol, a.shrout \
             FROM {monthly} a \
             INNER JOIN {names} b ON a.permno = b.permno \
             WHERE a.date >= b.namedt AND a.date <= b.nameendt \
             AND a.date BETWEEN '{first_day}' AND '{last_day}' \
             AND {id_filter}",
            monthly = self.monthly_table,
            names = self.names_table,
            first_day = first_day.format("%Y-%m-%d"),
            last_day = last_day.format("%Y-%m-%d"),
        );

        PanelQuery {
            sql,
            identifiers: chunk.clone(),
            first_day,
            last_day,
        }
    }

    /// Plan one query per chunk of at most `chunk_size` identifiers.
    pub fn plan(
        &self,
        batch: &IdentifierBatch,
        start: Period,
        end: Period,
        chunk_size: usize,
    ) -> Result<Vec<PanelQuery>, DataError> {
        if chunk_size == 0 {
            return Err(DataError::Validation("chunk_size must be positive".into()));
        }
        let (first_day, last_day) = (start.first_day(), end.last_day());
        Ok(batch
            .chunks(chunk_size)
            .iter()
            .map(|chunk| self.build(chunk, first_day, last_day))
            .collect())
    }

    /// Classify `identifiers`, run one query per chunk, and assemble the panel.
    ///
    /// `start`/`end` are year-month strings bounding an inclusive window.
    /// A batch that matches nothing yields an empty table, not an error.
    pub fn fetch(
        &self,
        source: &mut dyn PanelSource,
        identifiers: &[RawIdentifier],
        start: &str,
        end: &str,
        chunk_size: usize,
    ) -> Result<PanelTable, DataError> {
        let start = Period::parse(start)?;
        let end = Period::parse(end)?;
        let batch = IdentifierBatch::classify(identifiers)?;
        let queries = self.plan(&batch, start, end, chunk_size)?;

        info!(
            event_type = "panel_fetch_start",
            kind = ?batch.kind(),
            identifiers = batch.len(),
            chunks = queries.len(),
            start = %start,
            end = %end,
            "Fetching panel"
        );

        let mut rows = Vec::new();
        for (i, query) in queries.iter().enumerate() {
            let chunk_rows = source.execute(query)?;
            debug!(
                event_type = "panel_chunk",
                chunk = i,
                identifiers = query.identifiers.len(),
                rows = chunk_rows.len(),
                "Chunk complete"
            );
            rows.extend(chunk_rows);
        }

        if rows.is_empty() {
            info!(event_type = "panel_fetch_empty", "No rows matched");
            return Ok(PanelTable::empty());
        }

        Ok(PanelTable::from_rows(rows))
    }

    /// [`fetch`](Self::fetch) with the builder's own chunk size.
    pub fn fetch_configured(
        &self,
        source: &mut dyn PanelSource,
        identifiers: &[RawIdentifier],
        start: &str,
        end: &str,
    ) -> Result<PanelTable, DataError> {
        self.fetch(source, identifiers, start, end, self.chunk_size)
    }
}

/// [`PanelQueryBuilder::plan`] with the default table names.
pub fn plan_queries(
    batch: &IdentifierBatch,
    start: Period,
    end: Period,
    chunk_size: usize,
) -> Result<Vec<PanelQuery>, DataError> {
    PanelQueryBuilder::default().plan(batch, start, end, chunk_size)
}

/// [`PanelQueryBuilder::fetch`] with the default table names.
pub fn fetch_panel(
    source: &mut dyn PanelSource,
    identifiers: &[RawIdentifier],
    start: &str,
    end: &str,
    chunk_size: usize,
) -> Result<PanelTable, DataError> {
    PanelQueryBuilder::default().fetch(source, identifiers, start, end, chunk_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn numeric_chunk_renders_permno_filter() {
        let q = PanelQueryBuilder::default().build(
            &IdentifierBatch::Permnos(vec![14593, 12079]),
            day("2020-01-01"),
            day("2020-12-31"),
        );
        assert!(q.sql.contains("FROM crspm.msf a"));
        assert!(q.sql.contains("INNER JOIN crspm.msenames b"));
        assert!(q.sql.contains("BETWEEN '2020-01-01' AND '2020-12-31'"));
        assert!(q.sql.ends_with("AND a.permno IN (14593,12079)"));
        assert_eq!(q.kind(), IdentifierKind::Permno);
    }

    #[test]
    fn ticker_chunk_renders_quoted_list() {
        let q = PanelQueryBuilder::new("m", "n").build(
            &IdentifierBatch::Tickers(vec!["AAPL".into(), "MSFT".into()]),
            day("2021-02-01"),
            day("2021-02-28"),
        );
        assert!(q.sql.contains("FROM m a"));
        assert!(q.sql.ends_with("AND b.ticker IN ('AAPL','MSFT')"));
    }

    #[test]
    fn plan_covers_whole_months() {
        let batch = IdentifierBatch::Permnos((1..=5).collect());
        let start = Period::parse("2020-02").unwrap();
        let end = Period::parse("2020-02").unwrap();
        let plan = PanelQueryBuilder::default().plan(&batch, start, end, 2).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].first_day, day("2020-02-01"));
        assert_eq!(plan[0].last_day, day("2020-02-29"));
    }

    #[test]
    fn chunk_size_follows_config() {
        let config = CrspConfig {
            chunk_size: 250,
            ..CrspConfig::default()
        };
        assert_eq!(PanelQueryBuilder::from_config(&config).chunk_size(), 250);
        assert_eq!(PanelQueryBuilder::new("m", "n").chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let batch = IdentifierBatch::Permnos(vec![1]);
        let p = Period::parse("2020-01").unwrap();
        assert!(matches!(
            PanelQueryBuilder::default().plan(&batch, p, p, 0),
            Err(DataError::Validation(_))
        ));
    }
}

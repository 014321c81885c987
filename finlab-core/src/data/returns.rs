//! Monthly returns from daily bars.
//!
//! Each ticker contributes its month-end adjusted close and the
//! month-over-month return of that close. Tickers are aligned on the union of
//! their months with `NaN` where a ticker has no data.

use chrono::{Months, NaiveDate};
use tracing::{debug, info};

use super::provider::{DailyPriceSource, DataError, RawBar};
use crate::domain::{MonthlyTable, Period};

/// Column holding the risk-free rate in a three-factor table.
pub const RF_COLUMN: &str = "RF";

/// Last bar of every calendar month that has a finite adjusted close.
pub fn month_end_closes(bars: &[RawBar]) -> Vec<(Period, f64)> {
    let mut sorted: Vec<&RawBar> = bars.iter().filter(|b| b.adj_close.is_finite()).collect();
    sorted.sort_by_key(|b| b.date);

    let mut out: Vec<(Period, f64)> = Vec::new();
    for bar in sorted {
        let period = Period::from_date(bar.date);
        match out.last_mut() {
            Some((last, close)) if *last == period => *close = bar.adj_close,
            _ => out.push((period, bar.adj_close)),
        }
    }
    out
}

/// Per-ticker table of `<TICKER>` returns and `<TICKER> Adj Close`, without
/// the first (return-less) month.
fn ticker_table(ticker: &str, closes: &[(Period, f64)]) -> Result<MonthlyTable, DataError> {
    let rows = closes
        .windows(2)
        .map(|w| {
            let (_, prev) = w[0];
            let (period, close) = w[1];
            (period, vec![close / prev - 1.0, close])
        })
        .collect();
    MonthlyTable::from_rows(vec![ticker.to_string(), format!("{ticker} Adj Close")], rows)
}

/// Accepts `YYYY-MM-DD`, or `YYYY-MM` taken as the first (`end = false`) or
/// last (`end = true`) day of that month.
fn parse_bound(input: &str, end: bool) -> Result<NaiveDate, DataError> {
    if let Ok(d) = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        return Ok(d);
    }
    let period = Period::parse(input)?;
    Ok(if end { period.last_day() } else { period.first_day() })
}

/// Fetch daily bars for `tickers` and build the monthly return table.
///
/// The fetch window opens one calendar month before `start` so the first
/// requested month has a return. When `rf` is given its `RF` column is
/// left-joined onto the result.
pub fn monthly_returns(
    source: &dyn DailyPriceSource,
    tickers: &[&str],
    start: &str,
    end: &str,
    rf: Option<&MonthlyTable>,
) -> Result<MonthlyTable, DataError> {
    if tickers.is_empty() {
        return Err(DataError::EmptyInput("at least one ticker is required".into()));
    }
    let start = parse_bound(start, false)?;
    let end = parse_bound(end, true)?;
    let fetch_start = start
        .checked_sub_months(Months::new(1))
        .ok_or_else(|| DataError::InvalidDate(format!("{start} has no preceding month")))?;

    info!(
        event_type = "returns_fetch_start",
        source = source.name(),
        tickers = tickers.len(),
        start = %fetch_start,
        end = %end,
        "Fetching daily bars"
    );

    let mut table: Option<MonthlyTable> = None;
    let mut seen: Vec<&str> = Vec::with_capacity(tickers.len());
    for &ticker in tickers {
        if seen.contains(&ticker) {
            continue;
        }
        seen.push(ticker);

        let fetched = source.fetch(ticker, fetch_start, end)?;
        let closes = month_end_closes(&fetched.bars);
        let t = ticker_table(ticker, &closes)?;
        debug!(
            event_type = "ticker_returns",
            symbol = %ticker,
            bars = fetched.bars.len(),
            months = t.len(),
            "Computed monthly returns"
        );

        table = Some(match table {
            None => t,
            Some(acc) => acc.outer_join(&t)?,
        });
    }

    let mut out = table.unwrap_or_else(|| MonthlyTable::empty(Vec::new()));
    if let Some(rf) = rf {
        out = out.left_join(&rf.select(&[RF_COLUMN])?)?;
    }
    Ok(out)
}

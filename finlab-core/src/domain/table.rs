//! Monthly time-series table.
//!
//! Rows are keyed by a unique, strictly increasing [`Period`] index; columns
//! are named `f64` series with `NaN` marking a missing value. Every
//! constructor and transformation preserves the index invariant.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::period::{DateRange, Period};
use crate::data::DataError;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub(crate) fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
    Outer,
}

/// Table of monthly observations.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTable {
    index: Vec<Period>,
    columns: Vec<String>,
    /// Column-major: `data[c][r]`.
    data: Vec<Vec<f64>>,
}

impl MonthlyTable {
    /// A table with the given columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        let data = vec![Vec::new(); columns.len()];
        Self {
            index: Vec::new(),
            columns,
            data,
        }
    }

    /// Build a table from unordered rows.
    ///
    /// Rows are sorted by period; the first row of a duplicated period wins;
    /// rows with every value missing are dropped.
    pub fn from_rows(columns: Vec<String>, rows: Vec<(Period, Vec<f64>)>) -> Result<Self, DataError> {
        check_unique_columns(&columns)?;

        let width = columns.len();
        if let Some((period, row)) = rows.iter().find(|(_, r)| r.len() != width) {
            return Err(DataError::Validation(format!(
                "row {period} has {} values, expected {width}",
                row.len()
            )));
        }

        let mut rows: Vec<(Period, Vec<f64>)> = rows
            .into_iter()
            .filter(|(_, r)| width == 0 || r.iter().any(|v| !v.is_nan()))
            .collect();
        rows.sort_by_key(|(p, _)| *p);
        rows.dedup_by_key(|(p, _)| *p);

        let mut index = Vec::with_capacity(rows.len());
        let mut data = vec![Vec::with_capacity(rows.len()); width];
        for (period, row) in rows {
            index.push(period);
            for (c, v) in row.into_iter().enumerate() {
                data[c].push(v);
            }
        }

        Ok(Self {
            index,
            columns,
            data,
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[Period] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.position(name).map(|c| self.data[c].as_slice())
    }

    pub fn value(&self, period: Period, column: &str) -> Option<f64> {
        let c = self.position(column)?;
        let r = self.index.binary_search(&period).ok()?;
        Some(self.data[c][r])
    }

    /// Values of row `r` in column order.
    pub fn row(&self, r: usize) -> Option<Vec<f64>> {
        (r < self.len()).then(|| self.data.iter().map(|col| col[r]).collect())
    }

    pub fn first_period(&self) -> Option<Period> {
        self.index.first().copied()
    }

    pub fn last_period(&self) -> Option<Period> {
        self.index.last().copied()
    }

    /// Earliest and latest period present.
    pub fn coverage(&self) -> Option<(Period, Period)> {
        Some((self.first_period()?, self.last_period()?))
    }

    /// Keep rows whose period lies in the inclusive range.
    pub fn filter(&self, range: &DateRange) -> Self {
        if range.is_unbounded() {
            return self.clone();
        }
        let keep: Vec<usize> = (0..self.len())
            .filter(|&r| range.contains(self.index[r]))
            .collect();
        self.take_rows(&keep)
    }

    /// Rename columns; names not present are ignored.
    pub fn rename(mut self, mapping: &[(&str, &str)]) -> Result<Self, DataError> {
        for name in &mut self.columns {
            if let Some((_, to)) = mapping.iter().find(|(from, _)| *from == name.as_str()) {
                *name = (*to).to_string();
            }
        }
        check_unique_columns(&self.columns)?;
        Ok(self)
    }

    /// Project onto the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Self, DataError> {
        let mut columns = Vec::with_capacity(names.len());
        let mut data = Vec::with_capacity(names.len());
        for name in names {
            let c = self
                .position(name)
                .ok_or_else(|| DataError::MissingColumn((*name).to_string()))?;
            columns.push(self.columns[c].clone());
            data.push(self.data[c].clone());
        }
        check_unique_columns(&columns)?;
        Ok(Self {
            index: self.index.clone(),
            columns,
            data,
        })
    }

    /// Multiply every value by `factor`.
    pub fn scale(mut self, factor: f64) -> Self {
        for col in &mut self.data {
            for v in col.iter_mut() {
                *v *= factor;
            }
        }
        self
    }

    /// Rows present in both tables, columns of `self` followed by `other`.
    pub fn inner_join(&self, other: &MonthlyTable) -> Result<Self, DataError> {
        self.join(other, JoinKind::Inner)
    }

    /// All rows of `self`; columns of `other` are `NaN` where it has no row.
    pub fn left_join(&self, other: &MonthlyTable) -> Result<Self, DataError> {
        self.join(other, JoinKind::Left)
    }

    /// Union of both indexes; missing cells are `NaN`.
    pub fn outer_join(&self, other: &MonthlyTable) -> Result<Self, DataError> {
        self.join(other, JoinKind::Outer)
    }

    fn join(&self, other: &MonthlyTable, how: JoinKind) -> Result<Self, DataError> {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        check_unique_columns(&columns)?;

        let index: Vec<Period> = match how {
            JoinKind::Inner => {
                let theirs: HashSet<Period> = other.index.iter().copied().collect();
                self.index.iter().copied().filter(|p| theirs.contains(p)).collect()
            }
            JoinKind::Left => self.index.clone(),
            JoinKind::Outer => self
                .index
                .iter()
                .chain(other.index.iter())
                .copied()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let lookup = |table: &MonthlyTable| -> BTreeMap<Period, usize> {
            table.index.iter().enumerate().map(|(r, p)| (*p, r)).collect()
        };
        let ours = lookup(self);
        let theirs = lookup(other);

        let mut data = Vec::with_capacity(columns.len());
        for (table, rows) in [(self, &ours), (other, &theirs)] {
            for col in &table.data {
                data.push(
                    index
                        .iter()
                        .map(|p| rows.get(p).map_or(f64::NAN, |&r| col[r]))
                        .collect(),
                );
            }
        }

        Ok(Self {
            index,
            columns,
            data,
        })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn take_rows(&self, rows: &[usize]) -> Self {
        Self {
            index: rows.iter().map(|&r| self.index[r]).collect(),
            columns: self.columns.clone(),
            data: self
                .data
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
        }
    }

    /// CSV text with a `date` column (`YYYY-MM`) and empty cells for `NaN`.
    pub fn to_csv(&self) -> Result<String, DataError> {
        let mut wtr = csv::Writer::from_writer(vec![]);

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push("date");
        header.extend(self.columns.iter().map(String::as_str));
        wtr.write_record(&header)?;

        for (r, period) in self.index.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(period.to_string());
            for col in &self.data {
                let v = col[r];
                record.push(if v.is_nan() { String::new() } else { v.to_string() });
            }
            wtr.write_record(&record)?;
        }

        let data = wtr
            .into_inner()
            .map_err(|e| DataError::Csv(format!("failed to flush CSV writer: {e}")))?;
        String::from_utf8(data).map_err(|e| DataError::Csv(e.to_string()))
    }

    /// Polars frame with a `date` column (first day of each period).
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let days: Vec<i32> = self.index.iter().map(|p| epoch_days(p.first_day())).collect();
        let date = Series::new("date".into(), days).cast(&DataType::Date)?;

        let mut cols: Vec<Column> = Vec::with_capacity(self.columns.len() + 1);
        cols.push(Column::from(date));
        for (name, values) in self.columns.iter().zip(&self.data) {
            cols.push(Column::new(name.as_str().into(), values.as_slice()));
        }
        DataFrame::new(cols)
    }
}

fn check_unique_columns(columns: &[String]) -> Result<(), DataError> {
    let mut seen = HashSet::with_capacity(columns.len());
    for c in columns {
        if !seen.insert(c.as_str()) {
            return Err(DataError::Validation(format!("duplicate column '{c}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Period {
        Period::parse(s).unwrap()
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> MonthlyTable {
        MonthlyTable::from_rows(
            cols(&["a", "b"]),
            vec![
                (p("2020-03"), vec![3.0, 30.0]),
                (p("2020-01"), vec![1.0, 10.0]),
                (p("2020-02"), vec![2.0, 20.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn from_rows_sorts_dedupes_and_drops_empty_rows() {
        let t = MonthlyTable::from_rows(
            cols(&["a"]),
            vec![
                (p("2020-02"), vec![2.0]),
                (p("2020-01"), vec![1.0]),
                (p("2020-02"), vec![99.0]),
                (p("2020-03"), vec![f64::NAN]),
            ],
        )
        .unwrap();
        assert_eq!(t.index(), &[p("2020-01"), p("2020-02")]);
        assert_eq!(t.column("a").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn from_rows_rejects_ragged_rows_and_duplicate_columns() {
        let ragged = MonthlyTable::from_rows(cols(&["a", "b"]), vec![(p("2020-01"), vec![1.0])]);
        assert!(matches!(ragged, Err(DataError::Validation(_))));
        let dup = MonthlyTable::from_rows(cols(&["a", "a"]), vec![]);
        assert!(matches!(dup, Err(DataError::Validation(_))));
    }

    #[test]
    fn filter_is_inclusive() {
        let t = sample().filter(&DateRange::parse(Some("2020-02"), Some("2020-03")).unwrap());
        assert_eq!(t.index(), &[p("2020-02"), p("2020-03")]);
        assert_eq!(t.column("b").unwrap(), &[20.0, 30.0]);
    }

    #[test]
    fn rename_select_and_scale() {
        let t = sample()
            .rename(&[("a", "x"), ("missing", "y")])
            .unwrap()
            .scale(0.01);
        assert_eq!(t.columns(), &["x".to_string(), "b".to_string()]);
        let s = t.select(&["b"]).unwrap();
        assert_eq!(s.column("b").unwrap(), &[0.1, 0.2, 0.3]);
        assert!(matches!(t.select(&["nope"]), Err(DataError::MissingColumn(_))));
    }

    #[test]
    fn joins_align_on_period() {
        let left = sample();
        let right = MonthlyTable::from_rows(
            cols(&["rf"]),
            vec![(p("2020-02"), vec![0.5]), (p("2020-04"), vec![0.7])],
        )
        .unwrap();

        let inner = left.inner_join(&right).unwrap();
        assert_eq!(inner.index(), &[p("2020-02")]);
        assert_eq!(inner.value(p("2020-02"), "rf"), Some(0.5));

        let l = left.left_join(&right).unwrap();
        assert_eq!(l.len(), 3);
        assert!(l.value(p("2020-01"), "rf").unwrap().is_nan());

        let o = left.outer_join(&right).unwrap();
        assert_eq!(o.len(), 4);
        assert!(o.value(p("2020-04"), "a").unwrap().is_nan());
        assert_eq!(o.value(p("2020-04"), "rf"), Some(0.7));

        assert!(left.inner_join(&left).is_err());
    }

    #[test]
    fn csv_export_writes_blank_for_missing() {
        let t = MonthlyTable::from_rows(
            cols(&["a", "b"]),
            vec![(p("2021-05"), vec![0.25, f64::NAN])],
        )
        .unwrap();
        assert_eq!(t.to_csv().unwrap(), "date,a,b\n2021-05,0.25,\n");
    }

    #[test]
    fn dataframe_has_date_column() {
        let df = sample().to_dataframe().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        let b = df.column("b").unwrap().f64().unwrap();
        assert_eq!(b.get(2), Some(30.0));
    }

    #[test]
    fn epoch_days_matches_unix_epoch() {
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(epoch_days(NaiveDate::from_ymd_opt(1970, 1, 31).unwrap()), 30);
    }
}

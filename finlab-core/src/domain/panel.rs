//! Panel (security x month) query results.

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::period::Period;
use super::table::epoch_days;

/// One monthly stock-file observation joined to its name-history record.
///
/// Field names follow the source columns so database drivers can
/// deserialize rows directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub date: NaiveDate,
    pub permno: i64,
    pub permco: Option<i64>,
    pub ticker: Option<String>,
    pub comnam: Option<String>,
    pub shrcd: Option<i64>,
    pub exchcd: Option<i64>,
    pub siccd: Option<i64>,
    pub prc: Option<f64>,
    pub ret: Option<f64>,
    pub retx: Option<f64>,
    pub vol: Option<f64>,
    pub shrout: Option<f64>,
}

/// Rows keyed by (security, month), sorted by security then date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelTable {
    index: Vec<Period>,
    rows: Vec<PanelRow>,
}

impl PanelTable {
    /// Sort rows by `(permno, date)` (stable) and derive the period index.
    pub fn from_rows(mut rows: Vec<PanelRow>) -> Self {
        rows.sort_by(|a, b| a.permno.cmp(&b.permno).then(a.date.cmp(&b.date)));
        let index = rows.iter().map(|r| Period::from_date(r.date)).collect();
        Self { index, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Monthly period of each row, parallel to [`rows`](Self::rows).
    pub fn index(&self) -> &[Period] {
        &self.index
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    /// Rows for one security, in date order.
    pub fn security(&self, permno: i64) -> impl Iterator<Item = (Period, &PanelRow)> + '_ {
        self.index
            .iter()
            .copied()
            .zip(self.rows.iter())
            .filter(move |(_, r)| r.permno == permno)
    }

    /// Polars frame matching [`PanelSchema`](crate::data::schema::PanelSchema).
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let days: Vec<i32> = self.index.iter().map(|p| epoch_days(p.first_day())).collect();
        let date = Series::new("date".into(), days).cast(&DataType::Date)?;

        macro_rules! col {
            ($name:literal, $field:ident) => {
                Column::new(
                    $name.into(),
                    self.rows.iter().map(|r| r.$field.clone()).collect::<Vec<_>>(),
                )
            };
        }

        DataFrame::new(vec![
            Column::from(date),
            col!("permno", permno),
            col!("permco", permco),
            col!("ticker", ticker),
            col!("comnam", comnam),
            col!("shrcd", shrcd),
            col!("exchcd", exchcd),
            col!("siccd", siccd),
            col!("prc", prc),
            col!("ret", ret),
            col!("retx", retx),
            col!("vol", vol),
            col!("shrout", shrout),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(permno: i64, date: &str) -> PanelRow {
        PanelRow {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            permno,
            permco: Some(permno + 1),
            ticker: Some(format!("T{permno}")),
            comnam: None,
            shrcd: Some(11),
            exchcd: Some(3),
            siccd: None,
            prc: Some(10.0),
            ret: Some(0.01),
            retx: None,
            vol: Some(100.0),
            shrout: Some(5.0),
        }
    }

    #[test]
    fn rows_sort_by_security_then_date() {
        let t = PanelTable::from_rows(vec![
            row(2, "2020-02-28"),
            row(1, "2020-02-28"),
            row(2, "2020-01-31"),
            row(1, "2020-01-31"),
        ]);
        let keys: Vec<(i64, String)> = t
            .rows()
            .iter()
            .map(|r| (r.permno, r.date.to_string()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, "2020-01-31".to_string()),
                (1, "2020-02-28".to_string()),
                (2, "2020-01-31".to_string()),
                (2, "2020-02-28".to_string()),
            ]
        );
        assert_eq!(t.index()[1].to_string(), "2020-02");
        assert_eq!(t.security(2).count(), 2);
    }

    #[test]
    fn dataframe_keeps_nulls() {
        let t = PanelTable::from_rows(vec![row(7, "2021-03-31")]);
        let df = t.to_dataframe().unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.column("siccd").unwrap().null_count(), 1);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
    }
}

//! Ordinary least squares with an intercept, summarized as a coefficient
//! table with two-sided Student-t confidence intervals.

use nalgebra::{DMatrix, DVector};
use polars::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;

use super::FormulaError;
use crate::domain::MonthlyTable;

/// Name of the intercept row.
pub const CONST_NAME: &str = "const";

/// Explanatory variables, one named column each.
#[derive(Debug, Clone, PartialEq)]
pub struct Regressors {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl Regressors {
    /// A single unnamed series, reported as `x1`.
    pub fn single(x: Vec<f64>) -> Self {
        Self {
            names: vec!["x1".to_string()],
            columns: vec![x],
        }
    }

    pub fn named(columns: Vec<(String, Vec<f64>)>) -> Result<Self, FormulaError> {
        if columns.is_empty() {
            return Err(FormulaError::ShapeError("at least one regressor is required".into()));
        }
        let len = columns[0].1.len();
        if columns.iter().any(|(_, c)| c.len() != len) {
            return Err(FormulaError::ShapeError("regressors have differing lengths".into()));
        }
        let (names, columns) = columns.into_iter().unzip();
        Ok(Self { names, columns })
    }

    /// Every column of a monthly table, in table order.
    pub fn from_table(table: &MonthlyTable) -> Result<Self, FormulaError> {
        let columns = table
            .columns()
            .iter()
            .map(|name| {
                let values = table.column(name).map(<[f64]>::to_vec).unwrap_or_default();
                (name.clone(), values)
            })
            .collect();
        Self::named(columns)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn len(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }
}

/// One coefficient of a fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionSummary {
    /// Intercept first, then regressors in input order.
    pub coefficients: Vec<Coefficient>,
    pub confidence: f64,
    pub r_squared: f64,
    /// Rows used after dropping incomplete observations.
    pub observations: usize,
}

impl RegressionSummary {
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let pick = |f: fn(&Coefficient) -> f64| self.coefficients.iter().map(f).collect::<Vec<f64>>();
        let names: Vec<&str> = self.coefficients.iter().map(|c| c.name.as_str()).collect();
        DataFrame::new(vec![
            Column::new("coefficient".into(), names),
            Column::new("estimate".into(), pick(|c| c.estimate)),
            Column::new("std_error".into(), pick(|c| c.std_error)),
            Column::new("lower".into(), pick(|c| c.lower)),
            Column::new("upper".into(), pick(|c| c.upper)),
        ])
    }
}

impl fmt::Display for RegressionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = self.confidence * 100.0;
        writeln!(
            f,
            "{:<12} {:>12} {:>12} {:>12} {:>12}",
            "", "coef", "std err", format!("[{:.1}%", (100.0 - level) / 2.0), format!("{:.1}%]", 100.0 - (100.0 - level) / 2.0)
        )?;
        for c in &self.coefficients {
            writeln!(
                f,
                "{:<12} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
                c.name, c.estimate, c.std_error, c.lower, c.upper
            )?;
        }
        write!(f, "R-squared: {:.4}, Observations: {}", self.r_squared, self.observations)
    }
}

/// Fit `y = b0 + b·x` by least squares.
///
/// Observations with a missing (`NaN`) value in `y` or any regressor are
/// dropped first.
pub fn regression_summary(x: &Regressors, y: &[f64], confidence: f64) -> Result<RegressionSummary, FormulaError> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(FormulaError::InvalidArgument(format!(
            "confidence must lie strictly between 0 and 1, got {confidence}"
        )));
    }
    if x.len() != y.len() {
        return Err(FormulaError::ShapeError(format!(
            "y has {} observations, regressors have {}",
            y.len(),
            x.len()
        )));
    }

    let rows: Vec<usize> = (0..y.len())
        .filter(|&i| !y[i].is_nan() && x.columns.iter().all(|c| !c[i].is_nan()))
        .collect();
    let n = rows.len();
    let k = x.columns.len() + 1;
    if n <= k {
        return Err(FormulaError::InsufficientData(format!(
            "{n} complete observations for {k} coefficients"
        )));
    }

    let design = DMatrix::from_fn(n, k, |r, c| if c == 0 { 1.0 } else { x.columns[c - 1][rows[r]] });
    let target = DVector::from_iterator(n, rows.iter().map(|&i| y[i]));

    let xtx_inv = (design.transpose() * &design)
        .try_inverse()
        .ok_or_else(|| FormulaError::SingularSystem("regressors are collinear".into()))?;
    let beta = &xtx_inv * design.transpose() * &target;

    let residuals = &target - &design * &beta;
    let ssr = residuals.norm_squared();
    let mean_y = target.mean();
    let sst = target.iter().map(|v| (v - mean_y).powi(2)).sum::<f64>();
    let df = (n - k) as f64;
    let sigma2 = ssr / df;

    let t_crit = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| FormulaError::InvalidArgument(format!("t distribution: {e}")))?
        .inverse_cdf(1.0 - (1.0 - confidence) / 2.0);

    let names = std::iter::once(CONST_NAME.to_string()).chain(x.names.iter().cloned());
    let coefficients = names
        .enumerate()
        .map(|(j, name)| {
            let estimate = beta[j];
            let std_error = (sigma2 * xtx_inv[(j, j)]).sqrt();
            Coefficient {
                name,
                estimate,
                std_error,
                lower: estimate - t_crit * std_error,
                upper: estimate + t_crit * std_error,
            }
        })
        .collect();

    Ok(RegressionSummary {
        coefficients,
        confidence,
        r_squared: if sst > 0.0 { 1.0 - ssr / sst } else { f64::NAN },
        observations: n,
    })
}

fn simple_fit(y: &[f64], x: &[f64]) -> Result<RegressionSummary, FormulaError> {
    regression_summary(&Regressors::single(x.to_vec()), y, 0.95)
}

/// Intercept of the simple regression of `y` on `x`.
pub fn intercept(y: &[f64], x: &[f64]) -> Result<f64, FormulaError> {
    Ok(simple_fit(y, x)?.coefficients[0].estimate)
}

/// Slope of the simple regression of `y` on `x`.
pub fn slope(y: &[f64], x: &[f64]) -> Result<f64, FormulaError> {
    Ok(simple_fit(y, x)?.coefficients[1].estimate)
}

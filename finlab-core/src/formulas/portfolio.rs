//! Mean-variance portfolio tools.
//!
//! The frontier and tangent portfolios carry no bounds on the weights, so
//! both have closed forms: the frontier point solves the KKT system of the
//! equality-constrained quadratic program, and the tangent portfolio is
//! `Σ⁻¹(μ - rf)` rescaled to the required normalization.

use nalgebra::{DMatrix, DVector};
use std::fmt;

use super::FormulaError;

/// Singular values below this are treated as zero in the fallback solve.
const SVD_EPS: f64 = 1e-12;

/// A square covariance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance(DMatrix<f64>);

impl Covariance {
    /// Build from row vectors. Empty or ragged input is a `TypeError` (not a
    /// matrix at all); a non-square matrix is a `ShapeError`.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, FormulaError> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if nrows == 0 || ncols == 0 {
            return Err(FormulaError::TypeError("covariance matrix must be a non-empty 2D array".into()));
        }
        if rows.iter().any(|r| r.len() != ncols) {
            return Err(FormulaError::TypeError("covariance matrix rows have differing lengths".into()));
        }
        if nrows != ncols {
            return Err(FormulaError::ShapeError(format!(
                "covariance matrix must be square, got {nrows}x{ncols}"
            )));
        }
        Ok(Self(DMatrix::from_fn(nrows, ncols, |i, j| rows[i][j])))
    }

    pub fn from_matrix(matrix: DMatrix<f64>) -> Result<Self, FormulaError> {
        if matrix.is_empty() || !matrix.is_square() {
            return Err(FormulaError::ShapeError(format!(
                "covariance matrix must be square and non-empty, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        Ok(Self(matrix))
    }

    /// Number of assets.
    pub fn dim(&self) -> usize {
        self.0.nrows()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.0
    }

    fn check_len(&self, what: &str, len: usize) -> Result<(), FormulaError> {
        if len != self.dim() {
            return Err(FormulaError::ShapeError(format!(
                "{what} has length {len}, covariance matrix is {n}x{n}",
                n = self.dim()
            )));
        }
        Ok(())
    }
}

/// Weights with their expected return and volatility.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioPoint {
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub volatility: f64,
}

impl PortfolioPoint {
    fn new(weights: DVector<f64>, expected_returns: &DVector<f64>, cov: &Covariance) -> Self {
        let expected_return = weights.dot(expected_returns);
        let volatility = quad_form(&weights, cov).sqrt();
        Self {
            weights: weights.iter().copied().collect(),
            expected_return,
            volatility,
        }
    }
}

fn quad_form(w: &DVector<f64>, cov: &Covariance) -> f64 {
    // Rounding can push a PSD form slightly below zero.
    w.dot(&(cov.matrix() * w)).max(0.0)
}

/// `sqrt(wᵗ Σ w)`.
pub fn portfolio_volatility(weights: &[f64], cov: &Covariance) -> Result<f64, FormulaError> {
    cov.check_len("weights", weights.len())?;
    Ok(quad_form(&DVector::from_column_slice(weights), cov).sqrt())
}

/// Sharpe ratio `(wᵗμ - rf) / σ`, or `wᵗμ / σ` for a zero-cost portfolio.
/// A missing `rf` counts as zero.
pub fn portfolio_sharpe(
    weights: &[f64],
    expected_returns: &[f64],
    cov: &Covariance,
    rf: Option<f64>,
    zero_cost: bool,
) -> Result<f64, FormulaError> {
    if weights.len() != expected_returns.len() {
        return Err(FormulaError::ShapeError(format!(
            "weights and expected_returns must have the same length ({})",
            expected_returns.len()
        )));
    }
    cov.check_len("expected_returns", expected_returns.len())?;

    let port_ret: f64 = weights.iter().zip(expected_returns).map(|(w, m)| w * m).sum();
    let port_vol = portfolio_volatility(weights, cov)?;
    let excess = if zero_cost {
        port_ret
    } else {
        port_ret - rf.unwrap_or(0.0)
    };
    Ok(excess / port_vol)
}

/// Minimum-volatility portfolio with `wᵗμ = target` and `Σw = 1`.
/// Weights are unbounded, so short positions are allowed. Fails with
/// [`FormulaError::SingularSystem`] when no weights meet both constraints.
pub fn efficient_frontier_portfolio(
    target: f64,
    expected_returns: &[f64],
    cov: &Covariance,
) -> Result<PortfolioPoint, FormulaError> {
    cov.check_len("expected_returns", expected_returns.len())?;
    let n = cov.dim();

    // [2Σ  μ  1] [w ]   [0]
    // [μᵗ  0  0] [λ1] = [target]
    // [1ᵗ  0  0] [λ2]   [1]
    let mut kkt = DMatrix::<f64>::zeros(n + 2, n + 2);
    kkt.view_mut((0, 0), (n, n)).copy_from(&(cov.matrix() * 2.0));
    for (i, &mu) in expected_returns.iter().enumerate() {
        kkt[(i, n)] = mu;
        kkt[(n, i)] = mu;
        kkt[(i, n + 1)] = 1.0;
        kkt[(n + 1, i)] = 1.0;
    }
    let mut rhs = DVector::<f64>::zeros(n + 2);
    rhs[n] = target;
    rhs[n + 1] = 1.0;

    let mu = DVector::from_column_slice(expected_returns);
    let feasible = |solution: DVector<f64>| {
        let point = PortfolioPoint::new(solution.rows(0, n).into_owned(), &mu, cov);
        let budget: f64 = point.weights.iter().sum();
        let ok = point.expected_return.is_finite()
            && (budget - 1.0).abs() <= 1e-6
            && (point.expected_return - target).abs() <= 1e-6 * target.abs().max(1.0);
        ok.then_some(point)
    };

    // Dependent constraint rows (all means equal, or a single asset) leave
    // the system singular but possibly consistent, so solve in the
    // minimum-norm sense and keep the result only if it meets both
    // constraints.
    kkt.svd(true, true)
        .solve(&rhs, SVD_EPS)
        .ok()
        .and_then(feasible)
        .ok_or_else(|| {
            FormulaError::SingularSystem(format!(
                "no portfolio reaches target return {target} with weights summing to one"
            ))
        })
}

/// Maximum-Sharpe portfolio.
///
/// Standard case: weights sum to one and the excess return over `rf` is
/// used. With `factors` the first weight is fixed at one and the zero-cost
/// Sharpe ratio is maximized, which suits long-short factor portfolios.
pub fn tangent_portfolio(
    expected_returns: &[f64],
    cov: &Covariance,
    rf: Option<f64>,
    factors: bool,
) -> Result<PortfolioPoint, FormulaError> {
    cov.check_len("expected_returns", expected_returns.len())?;
    let mu = DVector::from_column_slice(expected_returns);
    let excess = if factors {
        mu.clone()
    } else {
        mu.add_scalar(-rf.unwrap_or(0.0))
    };

    let z = cov
        .matrix()
        .clone()
        .lu()
        .solve(&excess)
        .ok_or_else(|| FormulaError::SingularSystem("covariance matrix is singular".into()))?;

    let scale = if factors { z[0] } else { z.sum() };
    if !scale.is_finite() || scale <= 0.0 {
        return Err(FormulaError::NoTangentPortfolio(if factors {
            "first asset would carry a non-positive weight in the maximum-Sharpe direction".into()
        } else {
            "expected excess returns leave no fully invested portfolio with maximal Sharpe ratio".into()
        }));
    }

    Ok(PortfolioPoint::new(z / scale, &mu, cov))
}

/// Mean and population standard deviation of a named series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSummary {
    pub name: String,
    pub mean: f64,
    pub std_dev: f64,
}

impl fmt::Display for SeriesSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} |  Mean: {:.4} | Std Dev: {:.6}",
            self.name, self.mean, self.std_dev
        )
    }
}

pub fn describe(name: &str, series: &[f64]) -> SeriesSummary {
    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let var = series.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    SeriesSummary {
        name: name.to_string(),
        mean,
        std_dev: var.sqrt(),
    }
}

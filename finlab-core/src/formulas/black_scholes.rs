//! Black-Scholes European option pricing.
//!
//! Rates are quoted as annual simple rates and converted to continuous
//! compounding with `ln(1 + rf)` before use.

use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;
use std::str::FromStr;

use super::FormulaError;

/// Lower end of the implied-volatility search bracket.
pub const IV_LOWER: f64 = 1e-6;
/// Upper end of the implied-volatility search bracket.
pub const IV_UPPER: f64 = 5.0;

const IV_TOLERANCE: f64 = 1e-12;
const IV_MAX_ITER: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    Call,
    Put,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Call => write!(f, "call"),
            OptionKind::Put => write!(f, "put"),
        }
    }
}

impl FromStr for OptionKind {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(OptionKind::Call),
            "put" => Ok(OptionKind::Put),
            _ => Err(FormulaError::InvalidOptionType(s.to_string())),
        }
    }
}

fn norm_cdf(x: f64) -> f64 {
    // Unit parameters are always valid.
    Normal::new(0.0, 1.0).map_or(f64::NAN, |n| n.cdf(x))
}

/// Price a European option.
pub fn price_option(kind: OptionKind, spot: f64, strike: f64, maturity_years: f64, rf: f64, vol: f64) -> f64 {
    let r = (1.0 + rf).ln();
    let sqrt_t = maturity_years.sqrt();
    let d1 = ((spot / strike).ln() + (r + 0.5 * vol * vol) * maturity_years) / (vol * sqrt_t);
    let d2 = d1 - vol * sqrt_t;
    let df = (-r * maturity_years).exp();

    match kind {
        OptionKind::Call => spot * norm_cdf(d1) - strike * df * norm_cdf(d2),
        OptionKind::Put => strike * df * norm_cdf(-d2) - spot * norm_cdf(-d1),
    }
}

/// [`price_option`] with the kind given as text (`"call"` / `"put"`).
pub fn price_option_str(
    kind: &str,
    spot: f64,
    strike: f64,
    maturity_years: f64,
    rf: f64,
    vol: f64,
) -> Result<f64, FormulaError> {
    let kind: OptionKind = kind.parse()?;
    Ok(price_option(kind, spot, strike, maturity_years, rf, vol))
}

/// Volatility that reproduces `observed` within `[IV_LOWER, IV_UPPER]`.
///
/// Returns `NaN` when the bracket does not contain a root, i.e. the price
/// is unreachable for any volatility in range. Callers must check.
pub fn implied_volatility(
    kind: OptionKind,
    observed: f64,
    spot: f64,
    strike: f64,
    maturity_years: f64,
    rf: f64,
) -> f64 {
    let objective = |vol: f64| price_option(kind, spot, strike, maturity_years, rf, vol) - observed;

    let (mut lo, mut hi) = (IV_LOWER, IV_UPPER);
    let (mut f_lo, f_hi) = (objective(lo), objective(hi));
    if !f_lo.is_finite() || !f_hi.is_finite() {
        return f64::NAN;
    }
    if f_lo == 0.0 {
        return lo;
    }
    if f_hi == 0.0 {
        return hi;
    }
    if f_lo.signum() == f_hi.signum() {
        return f64::NAN;
    }

    for _ in 0..IV_MAX_ITER {
        let mid = 0.5 * (lo + hi);
        let f_mid = objective(mid);
        if f_mid == 0.0 || (hi - lo) < IV_TOLERANCE {
            return mid;
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

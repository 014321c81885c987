//! Stateless quantitative finance formulas.

pub mod black_scholes;
pub mod portfolio;
pub mod regression;

pub use black_scholes::{implied_volatility, price_option, price_option_str, OptionKind};
pub use portfolio::{
    describe, efficient_frontier_portfolio, portfolio_sharpe, portfolio_volatility,
    tangent_portfolio, Covariance, PortfolioPoint, SeriesSummary,
};
pub use regression::{intercept, regression_summary, slope, RegressionSummary, Regressors};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FormulaError {
    #[error("invalid option type '{0}'. Choose 'call' or 'put'")]
    InvalidOptionType(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("shape error: {0}")]
    ShapeError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("linear system is singular: {0}")]
    SingularSystem(String),

    #[error("no tangent portfolio: {0}")]
    NoTangentPortfolio(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

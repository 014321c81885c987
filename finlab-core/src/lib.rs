//! Finlab Core: monthly finance data pipelines and quantitative formulas.
//!
//! This crate contains:
//! - Domain types (periods, identifiers, monthly and panel tables)
//! - A query batcher that chunks identifier lists into bounded queries
//! - Normalizers for the market-data API, the factor-data library and the
//!   retail quote provider
//! - Option pricing, mean-variance portfolio and regression formulas
//!
//! Every external call is blocking and single-attempt.

pub mod config;
pub mod data;
pub mod domain;
pub mod formulas;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: tables and results can cross thread boundaries,
    /// so callers are free to run independent fetches on worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Period>();
        require_sync::<domain::Period>();
        require_send::<domain::DateRange>();
        require_sync::<domain::DateRange>();
        require_send::<domain::MonthlyTable>();
        require_sync::<domain::MonthlyTable>();
        require_send::<domain::PanelTable>();
        require_sync::<domain::PanelTable>();
        require_send::<domain::IdentifierBatch>();
        require_sync::<domain::IdentifierBatch>();

        // Pipeline values
        require_send::<data::PanelQuery>();
        require_sync::<data::PanelQuery>();
        require_send::<data::StrategyReturns>();
        require_sync::<data::StrategyReturns>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();

        // Clients
        require_send::<data::FactorLibrary>();
        require_sync::<data::FactorLibrary>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();

        // Formula results
        require_send::<formulas::Covariance>();
        require_sync::<formulas::Covariance>();
        require_send::<formulas::PortfolioPoint>();
        require_sync::<formulas::PortfolioPoint>();
        require_send::<formulas::RegressionSummary>();
        require_sync::<formulas::RegressionSummary>();
    }

    /// The normalizers accept any source behind a trait object, so tests and
    /// alternative transports plug in without touching pipeline code.
    #[test]
    fn sources_are_object_safe() {
        fn _panel(_: &mut dyn data::PanelSource) {}
        fn _factor(_: &dyn data::FactorSource) {}
        fn _daily(_: &dyn data::DailyPriceSource) {}
    }
}

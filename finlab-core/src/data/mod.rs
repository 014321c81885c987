//! Data pipelines: batch queries, table normalizers, and HTTP clients.

pub mod alpha_vantage;
pub mod batcher;
pub mod factor_library;
pub mod provider;
pub mod returns;
pub mod schema;
pub mod strategies;
pub mod yahoo;

pub use alpha_vantage::AlphaVantageClient;
pub use batcher::{fetch_panel, plan_queries, PanelQuery, PanelQueryBuilder};
pub use factor_library::{CsvLayout, Dataset, FactorLibrary, FactorModel};
pub use provider::{DailyPriceSource, DataError, FactorSource, FetchResult, PanelSource, RawBar};
pub use returns::monthly_returns;
pub use schema::{PanelSchema, SchemaError};
pub use strategies::{Strategy, StrategyDescription, StrategyReturns};
pub use yahoo::YahooProvider;

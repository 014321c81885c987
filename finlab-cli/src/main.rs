//! Finlab CLI: fetch monthly tables and evaluate option formulas.
//!
//! Commands:
//! - `factors`: three- or five-factor model table
//! - `strategy`: decile returns for a sorted-portfolio strategy
//! - `returns`: month-end prices and returns from daily quotes
//! - `alpha-vantage`: monthly adjusted series for one symbol
//! - `option price` / `option implied-vol`: Black-Scholes helpers
//!
//! Logging goes to stderr; set `RUST_LOG=finlab_core=info` to see fetches.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use finlab_core::config::FinlabConfig;
use finlab_core::data::{
    factor_library, monthly_returns, strategies, AlphaVantageClient, FactorLibrary, FactorModel,
    Strategy, YahooProvider,
};
use finlab_core::domain::{DateRange, MonthlyTable};
use finlab_core::formulas::{implied_volatility, price_option, OptionKind};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "finlab", about = "Finlab CLI: monthly finance data and formulas")]
struct Cli {
    /// TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write the resulting table to this CSV file.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Ff3,
    Ff5,
}

impl From<ModelArg> for FactorModel {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Ff3 => FactorModel::ThreeFactor,
            ModelArg::Ff5 => FactorModel::FiveFactor,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MergeArg {
    Ff3,
    Ff5,
    #[value(name = "none")]
    NoFactors,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Call,
    Put,
}

impl From<KindArg> for OptionKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Call => OptionKind::Call,
            KindArg::Put => OptionKind::Put,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download a factor model table from the factor-data library.
    Factors {
        #[arg(long, value_enum, default_value = "ff3")]
        model: ModelArg,

        /// First month (YYYY-MM or YYYYMM).
        #[arg(long)]
        start: Option<String>,

        /// Last month (YYYY-MM or YYYYMM).
        #[arg(long)]
        end: Option<String>,
    },
    /// Decile returns for a strategy: beta, momentum, shorttermreversal, accruals.
    Strategy {
        name: String,

        /// Factor model to merge in.
        #[arg(long, value_enum, default_value = "ff3")]
        factors: MergeArg,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        /// Print the strategy's construction methodology and coverage.
        #[arg(long, default_value_t = false)]
        details: bool,
    },
    /// Monthly returns and month-end adjusted closes from daily quotes.
    Returns {
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD or YYYY-MM).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD or YYYY-MM).
        #[arg(long)]
        end: String,

        /// Skip merging the risk-free rate column.
        #[arg(long, default_value_t = false)]
        no_rf: bool,
    },
    /// Monthly adjusted series from the market-data API.
    AlphaVantage {
        symbol: String,

        /// API key. Overrides the config file.
        #[arg(long, env = "ALPHAVANTAGE_API_KEY")]
        api_key: Option<String>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },
    /// Black-Scholes option helpers.
    #[command(name = "option")]
    Opt {
        #[command(subcommand)]
        action: OptionAction,
    },
}

#[derive(Subcommand)]
enum OptionAction {
    /// Price a European option.
    Price {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        /// Time to maturity in years.
        #[arg(long)]
        maturity: f64,
        /// Annual simple risk-free rate, e.g. 0.05.
        #[arg(long)]
        rf: f64,
        #[arg(long)]
        vol: f64,
    },
    /// Solve for the volatility implied by an observed price.
    ImpliedVol {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        #[arg(long)]
        maturity: f64,
        #[arg(long)]
        rf: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => FinlabConfig::from_file(path)?,
        None => FinlabConfig::default(),
    };
    let output = cli.output.as_deref();

    match cli.command {
        Commands::Factors { model, start, end } => run_factors(&config, model.into(), start, end, output),
        Commands::Strategy {
            name,
            factors,
            start,
            end,
            details,
        } => run_strategy(&config, &name, factors, start, end, details, output),
        Commands::Returns {
            tickers,
            start,
            end,
            no_rf,
        } => run_returns(&config, &tickers, &start, &end, no_rf, output),
        Commands::AlphaVantage {
            symbol,
            api_key,
            start,
            end,
        } => run_alpha_vantage(&config, &symbol, api_key, start, end, output),
        Commands::Opt { action } => run_option(action),
    }
}

fn date_range(start: Option<String>, end: Option<String>) -> Result<DateRange> {
    Ok(DateRange::parse(start.as_deref(), end.as_deref())?)
}

fn emit(table: &MonthlyTable, output: Option<&Path>) -> Result<()> {
    println!("{}", table.to_dataframe()?);
    if let Some(path) = output {
        std::fs::write(path, table.to_csv()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved {} rows to {}", table.len(), path.display());
    }
    Ok(())
}

fn run_factors(
    config: &FinlabConfig,
    model: FactorModel,
    start: Option<String>,
    end: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let range = date_range(start, end)?;
    let library = FactorLibrary::new(&config.factor_library, &config.http)?;
    let table = factor_library::factors(&library, model, &range)?;
    emit(&table, output)
}

#[allow(clippy::too_many_arguments)]
fn run_strategy(
    config: &FinlabConfig,
    name: &str,
    factors: MergeArg,
    start: Option<String>,
    end: Option<String>,
    details: bool,
    output: Option<&Path>,
) -> Result<()> {
    let strategy: Strategy = name.parse()?;
    let range = date_range(start, end)?;
    let model = match factors {
        MergeArg::Ff3 => Some(FactorModel::ThreeFactor),
        MergeArg::Ff5 => Some(FactorModel::FiveFactor),
        MergeArg::NoFactors => None,
    };

    let library = FactorLibrary::new(&config.factor_library, &config.http)?;
    let returns = strategies::strategy_returns(&library, strategy, &range, model)?;
    if details {
        println!("{}", returns.description);
        println!();
    }
    emit(&returns.table, output)
}

fn run_returns(
    config: &FinlabConfig,
    tickers: &[String],
    start: &str,
    end: &str,
    no_rf: bool,
    output: Option<&Path>,
) -> Result<()> {
    let provider = YahooProvider::new(&config.yahoo, &config.http)?;
    let rf = if no_rf {
        None
    } else {
        let library = FactorLibrary::new(&config.factor_library, &config.http)?;
        Some(factor_library::three_factors(&library, &DateRange::all())?)
    };

    let refs: Vec<&str> = tickers.iter().map(String::as_str).collect();
    let table = monthly_returns(&provider, &refs, start, end, rf.as_ref())?;
    emit(&table, output)
}

fn run_alpha_vantage(
    config: &FinlabConfig,
    symbol: &str,
    api_key: Option<String>,
    start: Option<String>,
    end: Option<String>,
    output: Option<&Path>,
) -> Result<()> {
    let range = date_range(start, end)?;
    let mut client = AlphaVantageClient::new(&config.alpha_vantage, &config.http)?;
    if let Some(key) = api_key {
        client = client.with_api_key(key);
    }
    let table = client.fetch_monthly_adjusted(symbol, &range)?;
    emit(&table, output)
}

fn run_option(action: OptionAction) -> Result<()> {
    match action {
        OptionAction::Price {
            kind,
            spot,
            strike,
            maturity,
            rf,
            vol,
        } => {
            if maturity <= 0.0 || vol <= 0.0 {
                bail!("--maturity and --vol must be positive");
            }
            let price = price_option(kind.into(), spot, strike, maturity, rf, vol);
            println!("{price:.6}");
        }
        OptionAction::ImpliedVol {
            kind,
            price,
            spot,
            strike,
            maturity,
            rf,
        } => {
            if maturity <= 0.0 {
                bail!("--maturity must be positive");
            }
            let iv = implied_volatility(kind.into(), price, spot, strike, maturity, rf);
            if iv.is_nan() {
                bail!("no volatility in (1e-6, 5.0) reproduces price {price}");
            }
            println!("{iv:.6}");
        }
    }
    Ok(())
}

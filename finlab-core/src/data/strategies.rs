//! Decile portfolios sorted on a characteristic, from the factor-data library.
//!
//! Each [`Strategy`] carries its own dataset layout, column renames and
//! methodology text, so adding a strategy is adding a match arm.

use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::factor_library::{self, CsvLayout, Dataset, FactorModel};
use super::provider::{DataError, FactorSource};
use crate::domain::{DateRange, MonthlyTable, Period};

/// The ten decile columns every strategy table ends up with.
pub const DECILES: [&str; 10] = [
    "Dec 1", "Dec 2", "Dec 3", "Dec 4", "Dec 5", "Dec 6", "Dec 7", "Dec 8", "Dec 9", "Dec 10",
];

const EXTREME_DECILES: &[(&str, &str)] = &[("Lo 10", "Dec 1"), ("Hi 10", "Dec 10")];

const PRIOR_DECILES: &[(&str, &str)] = &[
    ("Lo PRIOR", "Dec 1"),
    ("PRIOR 2", "Dec 2"),
    ("PRIOR 3", "Dec 3"),
    ("PRIOR 4", "Dec 4"),
    ("PRIOR 5", "Dec 5"),
    ("PRIOR 6", "Dec 6"),
    ("PRIOR 7", "Dec 7"),
    ("PRIOR 8", "Dec 8"),
    ("PRIOR 9", "Dec 9"),
    ("Hi PRIOR", "Dec 10"),
];

const EQUAL_WEIGHTED: &str = "Equal Weighted Returns -- Monthly";
const AVERAGE_EQUAL_WEIGHTED: &str = "Average Equal Weighted Returns -- Monthly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Beta,
    Momentum,
    ShortTermReversal,
    Accruals,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Beta,
        Strategy::Momentum,
        Strategy::ShortTermReversal,
        Strategy::Accruals,
    ];

    pub fn dataset(&self) -> Dataset {
        let (archive, member, skip_rows, footer_marker) = match self {
            Strategy::Beta => (
                "Portfolios_Formed_on_BETA_csv.zip",
                "Portfolios_Formed_on_BETA.csv",
                15,
                EQUAL_WEIGHTED,
            ),
            Strategy::Momentum => (
                "10_Portfolios_Prior_12_2_csv.zip",
                "10_Portfolios_Prior_12_2.csv",
                10,
                AVERAGE_EQUAL_WEIGHTED,
            ),
            Strategy::ShortTermReversal => (
                "10_Portfolios_Prior_1_0_csv.zip",
                "10_Portfolios_Prior_1_0.csv",
                10,
                EQUAL_WEIGHTED,
            ),
            Strategy::Accruals => (
                "Portfolios_Formed_on_AC_csv.zip",
                "Portfolios_Formed_on_AC.csv",
                17,
                EQUAL_WEIGHTED,
            ),
        };
        Dataset {
            archive,
            member,
            layout: CsvLayout {
                skip_rows,
                footer_marker,
            },
        }
    }

    fn renames(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Strategy::Beta | Strategy::Accruals => EXTREME_DECILES,
            Strategy::Momentum | Strategy::ShortTermReversal => PRIOR_DECILES,
        }
    }

    /// Whether the table is cut down to [`DECILES`]. The momentum file
    /// already holds exactly the ten deciles.
    fn deciles_only(&self) -> bool {
        !matches!(self, Strategy::Momentum)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Strategy::Beta => "Beta Strategy",
            Strategy::Momentum => "Momentum Strategy",
            Strategy::ShortTermReversal => "Short Term Reversal Strategy",
            Strategy::Accruals => "Accruals Strategy",
        }
    }

    pub fn methodology(&self) -> &'static str {
        match self {
            Strategy::Beta => "\
Basic Strategy: stocks are sorted into deciles based on their historical betas.

Construction: The portfolios are formed on univariate market beta at the end of each June using NYSE breakpoints.
Beta for June of year t is estimated using the preceding five years (two minimum) of past monthly returns.

Stocks: All NYSE, AMEX, and NASDAQ stocks for which we have market equity data for June of t and good returns for the preceding 60 months (24 months minimum).",
            Strategy::Momentum => "\
Basic Strategy: stocks are sorted into deciles based on their prior 12-month returns, excluding the most recent month.

Construction: The portfolios are constructed monthly using NYSE prior (2-12) return decile breakpoints.

Stocks: The portfolios constructed each month include NYSE, AMEX, and NASDAQ stocks with prior return data.
To be included in a portfolio for month t (formed at the end of month t-1), a stock must have a price for the
end of month t-13 and a good return for t-2. In addition, any missing returns from t-12 to t-3 must be -99.0,
CRSP's code for a missing price. Each included stock also must have ME for the end of month t-1.",
            Strategy::ShortTermReversal => "\
Basic Strategy: stocks are sorted into deciles based on their prior 1-month return.
Construction: The portfolios are formed on the prior one-month return at the end of each month.
Each portfolio is value-weighted.",
            Strategy::Accruals => "\
The portfolios are formed on Accruals at the end of each June using NYSE breakpoints.
Accruals for June of year t is the change in operating working capital per split-adjusted share from
the fiscal year end t-2 to t-1 divided by book equity per share in t-1.
Stocks are ranked and sorted into deciles. Each decile portfolio is value-weighted.",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Beta => "beta",
            Strategy::Momentum => "momentum",
            Strategy::ShortTermReversal => "shorttermreversal",
            Strategy::Accruals => "accruals",
        };
        f.write_str(name)
    }
}

impl FromStr for Strategy {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beta" => Ok(Strategy::Beta),
            "momentum" => Ok(Strategy::Momentum),
            "shorttermreversal" | "short-term-reversal" | "short_term_reversal" | "str" => {
                Ok(Strategy::ShortTermReversal)
            }
            "accruals" => Ok(Strategy::Accruals),
            _ => Err(DataError::UnsupportedStrategy(s.to_string())),
        }
    }
}

/// Methodology text plus the span of data the source file covers.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDescription {
    pub strategy: Strategy,
    pub title: &'static str,
    pub methodology: &'static str,
    /// First and last period before any date filter was applied.
    pub coverage: Option<(Period, Period)>,
}

impl fmt::Display for StrategyDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----------------")?;
        writeln!(f, "{}", self.title)?;
        writeln!(f, "----------------")?;
        writeln!(f, "{}", self.methodology)?;
        writeln!(f)?;
        match self.coverage {
            Some((min, max)) => write!(f, "Min Date: {min}, Max Date: {max}"),
            None => write!(f, "Min Date: n/a, Max Date: n/a"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrategyReturns {
    pub table: MonthlyTable,
    pub description: StrategyDescription,
}

/// Normalize a strategy file: parse, rename to deciles, select, filter.
pub fn normalize_strategy(text: &str, strategy: Strategy, range: &DateRange) -> Result<StrategyReturns, DataError> {
    let parsed = factor_library::parse_monthly_section(text, &strategy.dataset().layout)?;
    let renamed = parsed.rename(strategy.renames())?;
    let table = if strategy.deciles_only() {
        renamed.select(&DECILES)?
    } else {
        renamed
    };

    let description = StrategyDescription {
        strategy,
        title: strategy.title(),
        methodology: strategy.methodology(),
        coverage: table.coverage(),
    };

    Ok(StrategyReturns {
        table: table.filter(range),
        description,
    })
}

/// Rename factor columns to their lowercase names and inner-join them onto
/// `returns`.
pub fn merge_factors(returns: &MonthlyTable, factors: &MonthlyTable, model: FactorModel) -> Result<MonthlyTable, DataError> {
    let names = model.canonical_names();
    let renamed = factors.clone().rename(names)?;
    let wanted: Vec<&str> = names.iter().map(|(_, to)| *to).collect();
    returns.inner_join(&renamed.select(&wanted)?)
}

/// Fetch a strategy's decile returns and, when `model` is given, merge in
/// that factor model's columns.
pub fn strategy_returns(
    source: &dyn FactorSource,
    strategy: Strategy,
    range: &DateRange,
    model: Option<FactorModel>,
) -> Result<StrategyReturns, DataError> {
    let text = source.fetch_text(&strategy.dataset())?;
    let mut returns = normalize_strategy(&text, strategy, range)?;

    if let Some(model) = model {
        let factors = factor_library::factors(source, model, &DateRange::all())?;
        returns.table = merge_factors(&returns.table, &factors, model)?;
    }

    info!(
        event_type = "strategy_loaded",
        strategy = %strategy,
        factors = ?model.map(|m| m.to_string()),
        rows = returns.table.len(),
        "Strategy returns ready"
    );
    Ok(returns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beta_text() -> String {
        let mut text = String::new();
        for i in 0..15 {
            text.push_str(&format!("preamble line {i}\n"));
        }
        text.push_str(",Lo 20,Qnt 2,Qnt 3,Qnt 4,Hi 20,Lo 10,Dec 2,Dec 3,Dec 4,Dec 5,Dec 6,Dec 7,Dec 8,Dec 9,Hi 10\n");
        text.push_str("196307,1,2,3,4,5,10,20,30,40,50,60,70,80,90,100\n");
        text.push_str("196308,1,2,3,4,5,11,21,31,41,51,61,71,81,91,101\n");
        text.push_str("196309,1,2,3,4,5,12,22,32,42,52,62,72,82,92,102\n");
        text.push_str("\n  Equal Weighted Returns -- Monthly\n");
        text.push_str(",Lo 20,Qnt 2,Qnt 3,Qnt 4,Hi 20,Lo 10,Dec 2,Dec 3,Dec 4,Dec 5,Dec 6,Dec 7,Dec 8,Dec 9,Hi 10\n");
        text
    }

    #[test]
    fn beta_keeps_renamed_deciles() {
        let r = normalize_strategy(&beta_text(), Strategy::Beta, &DateRange::all()).unwrap();
        assert_eq!(r.table.columns(), &DECILES);
        assert_eq!(r.table.len(), 3);
        assert!((r.table.column("Dec 1").unwrap()[0] - 0.10).abs() < 1e-12);
        assert!((r.table.column("Dec 10").unwrap()[2] - 1.02).abs() < 1e-12);
    }

    #[test]
    fn coverage_ignores_date_filter() {
        let range = DateRange::parse(Some("1963-08"), Some("1963-08")).unwrap();
        let r = normalize_strategy(&beta_text(), Strategy::Beta, &range).unwrap();
        assert_eq!(r.table.len(), 1);
        let (min, max) = r.description.coverage.unwrap();
        assert_eq!(min.to_string(), "1963-07");
        assert_eq!(max.to_string(), "1963-09");
        let text = r.description.to_string();
        assert!(text.starts_with("----------------\nBeta Strategy\n"));
        assert!(text.ends_with("Min Date: 1963-07, Max Date: 1963-09"));
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Momentum".parse::<Strategy>().unwrap(), Strategy::Momentum);
        assert_eq!("STR".parse::<Strategy>().unwrap(), Strategy::ShortTermReversal);
        assert_eq!("short_term_reversal".parse::<Strategy>().unwrap(), Strategy::ShortTermReversal);
        for s in Strategy::ALL {
            assert_eq!(s.to_string().parse::<Strategy>().unwrap(), s);
        }
        assert!(matches!(
            "value".parse::<Strategy>(),
            Err(DataError::UnsupportedStrategy(name)) if name == "value"
        ));
    }

    #[test]
    fn merge_uses_every_five_factor_column() {
        let returns = MonthlyTable::from_rows(
            vec!["Dec 1".into()],
            vec![(Period::new(2020, 1).unwrap(), vec![0.01]), (Period::new(2020, 2).unwrap(), vec![0.02])],
        )
        .unwrap();
        let factors = MonthlyTable::from_rows(
            ["Mkt-RF", "SMB", "HML", "RMW", "CMA", "RF"].iter().map(|s| s.to_string()).collect(),
            vec![(Period::new(2020, 2).unwrap(), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.001])],
        )
        .unwrap();
        let merged = merge_factors(&returns, &factors, FactorModel::FiveFactor).unwrap();
        assert_eq!(
            merged.columns(),
            &["Dec 1", "mkt-rf", "smb", "hml", "rmw", "cma", "rf"]
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.column("rmw").unwrap()[0], 0.4);
    }
}

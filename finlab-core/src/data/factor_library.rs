//! Academic factor-data library.
//!
//! Each dataset is a zip archive holding one CSV file. The file opens with a
//! few lines of prose, then a header row and the monthly section, which ends
//! at a marker line introducing the annual (or next) section. Values are in
//! percent.

use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;
use tracing::{debug, info};
use zip::ZipArchive;

use super::provider::{DataError, FactorSource};
use crate::config::{FactorLibraryConfig, HttpConfig};
use crate::domain::{DateRange, MonthlyTable, Period};

/// Marker that ends the monthly section of the factor files.
pub const ANNUAL_MARKER: &str = "Annual Factors: January-December";

/// Where the monthly section sits inside a delimited text file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvLayout {
    /// Physical lines to skip before the header row.
    pub skip_rows: usize,
    /// Text whose presence in a row's leading field ends the section.
    pub footer_marker: &'static str,
}

/// One downloadable dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dataset {
    /// Archive file name under the library's base URL.
    pub archive: &'static str,
    /// Name of the CSV member inside the archive.
    pub member: &'static str,
    pub layout: CsvLayout,
}

/// Parse the monthly section of a factor-library CSV.
///
/// The leading column becomes the period index, remaining columns are
/// coerced to numbers (unparseable cells become `NaN`) and divided by 100.
pub fn parse_monthly_section(text: &str, layout: &CsvLayout) -> Result<MonthlyTable, DataError> {
    let body = text
        .lines()
        .skip(layout.skip_rows)
        .collect::<Vec<_>>()
        .join("\n");

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut columns: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut terminated = false;

    for record in rdr.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let Some(cols) = &columns else {
            columns = Some(
                record
                    .iter()
                    .enumerate()
                    .skip(1)
                    .map(|(i, name)| {
                        if name.is_empty() {
                            format!("Unnamed: {i}")
                        } else {
                            name.to_string()
                        }
                    })
                    .collect(),
            );
            continue;
        };

        let lead = record.get(0).unwrap_or_default();
        if lead.contains(layout.footer_marker) {
            terminated = true;
            break;
        }
        if lead.is_empty() {
            continue;
        }

        let period = Period::parse(lead).map_err(|_| {
            DataError::MalformedSource(format!("unrecognized period '{lead}' in monthly section"))
        })?;
        let values = (1..=cols.len())
            .map(|i| {
                record
                    .get(i)
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(f64::NAN)
            })
            .collect();
        rows.push((period, values));
    }

    if !terminated {
        return Err(DataError::MalformedSource(format!(
            "marker '{}' not found",
            layout.footer_marker
        )));
    }

    let columns = columns.unwrap_or_default();
    let table = MonthlyTable::from_rows(columns, rows)?.scale(0.01);
    debug!(
        event_type = "normalized",
        source = "factor_library",
        rows = table.len(),
        "Parsed monthly section"
    );
    Ok(table)
}

/// Read the CSV member out of a zip archive.
///
/// When `member` is absent but the archive holds exactly one file, that file
/// is used.
pub fn extract_member(archive_bytes: &[u8], member: &str) -> Result<String, DataError> {
    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))?;
    let index = match archive.index_for_name(member) {
        Some(i) => i,
        None if archive.len() == 1 => 0,
        None => {
            return Err(DataError::Archive(format!(
                "member '{member}' not found among {} files",
                archive.len()
            )))
        }
    };

    let mut file = archive.by_index(index)?;
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf)
        .map_err(|e| DataError::Archive(format!("failed to read '{member}': {e}")))?;
    // The library's files are mostly ASCII with the odd Latin-1 byte.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Fama-French style factor model tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorModel {
    /// Market, size, value, risk-free.
    ThreeFactor,
    /// Adds profitability and investment.
    FiveFactor,
}

impl FactorModel {
    pub fn dataset(&self) -> Dataset {
        match self {
            FactorModel::ThreeFactor => Dataset {
                archive: "F-F_Research_Data_Factors_CSV.zip",
                member: "F-F_Research_Data_Factors.csv",
                layout: CsvLayout {
                    skip_rows: 3,
                    footer_marker: ANNUAL_MARKER,
                },
            },
            FactorModel::FiveFactor => Dataset {
                archive: "F-F_Research_Data_5_Factors_2x3_CSV.zip",
                member: "F-F_Research_Data_5_Factors_2x3.csv",
                layout: CsvLayout {
                    skip_rows: 3,
                    footer_marker: ANNUAL_MARKER,
                },
            },
        }
    }

    /// Source column names mapped to the lowercase names used when merging.
    pub fn canonical_names(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            FactorModel::ThreeFactor => &[
                ("Mkt-RF", "mkt-rf"),
                ("SMB", "smb"),
                ("HML", "hml"),
                ("RF", "rf"),
            ],
            FactorModel::FiveFactor => &[
                ("Mkt-RF", "mkt-rf"),
                ("SMB", "smb"),
                ("HML", "hml"),
                ("RMW", "rmw"),
                ("CMA", "cma"),
                ("RF", "rf"),
            ],
        }
    }
}

impl fmt::Display for FactorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorModel::ThreeFactor => write!(f, "ff3"),
            FactorModel::FiveFactor => write!(f, "ff5"),
        }
    }
}

impl FromStr for FactorModel {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ff3" | "3" | "three" => Ok(FactorModel::ThreeFactor),
            "ff5" | "5" | "five" => Ok(FactorModel::FiveFactor),
            other => Err(DataError::Validation(format!(
                "unknown factor model '{other}'. Valid: ff3, ff5"
            ))),
        }
    }
}

/// Normalize a factor file and apply the inclusive date filter.
pub fn normalize_factors(text: &str, model: FactorModel, range: &DateRange) -> Result<MonthlyTable, DataError> {
    let table = parse_monthly_section(text, &model.dataset().layout)?;
    Ok(table.filter(range))
}

/// Fetch and normalize a factor model table.
pub fn factors(
    source: &dyn FactorSource,
    model: FactorModel,
    range: &DateRange,
) -> Result<MonthlyTable, DataError> {
    let text = source.fetch_text(&model.dataset())?;
    normalize_factors(&text, model, range)
}

pub fn three_factors(source: &dyn FactorSource, range: &DateRange) -> Result<MonthlyTable, DataError> {
    factors(source, FactorModel::ThreeFactor, range)
}

pub fn five_factors(source: &dyn FactorSource, range: &DateRange) -> Result<MonthlyTable, DataError> {
    factors(source, FactorModel::FiveFactor, range)
}

/// HTTP client for the factor-data library.
pub struct FactorLibrary {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl FactorLibrary {
    pub fn new(config: &FactorLibraryConfig, http: &HttpConfig) -> Result<Self, DataError> {
        Ok(Self {
            client: http.client()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn archive_url(&self, dataset: &Dataset) -> String {
        format!("{}/{}", self.base_url, dataset.archive)
    }
}

impl FactorSource for FactorLibrary {
    fn fetch_text(&self, dataset: &Dataset) -> Result<String, DataError> {
        let url = self.archive_url(dataset);
        let bytes = self.client.get(&url).send()?.error_for_status()?.bytes()?;
        info!(
            event_type = "download_complete",
            source = "factor_library",
            url = %url,
            bytes = bytes.len(),
            "Downloaded archive"
        );
        extract_member(&bytes, dataset.member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const FF3_TEXT: &str = "\
This file was created using the 202401 CRSP database.
The 1-month TBill rate data until 202312 are from Ibbotson Associates.

,Mkt-RF,SMB,HML,RF
192607,    2.96,   -2.56,   -2.43,    0.22
192608,    2.64,   -1.17,    3.82,    0.25
192609,    0.36,   -1.40,    0.13,    0.23

 Annual Factors: January-December
,Mkt-RF,SMB,HML,RF
1927,   29.47,   -2.04,   -4.54,    3.12
";

    fn zip_bytes(name: &str, content: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zw = zip::ZipWriter::new(&mut buf);
            zw.start_file(name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zw.write_all(content.as_bytes()).unwrap();
            zw.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn parses_monthly_section_and_scales() {
        let t = normalize_factors(FF3_TEXT, FactorModel::ThreeFactor, &DateRange::all()).unwrap();
        assert_eq!(t.columns(), &["Mkt-RF", "SMB", "HML", "RF"]);
        assert_eq!(t.len(), 3);
        assert_eq!(t.first_period().unwrap().to_string(), "1926-07");
        assert!((t.column("Mkt-RF").unwrap()[0] - 0.0296).abs() < 1e-12);
        assert!((t.column("RF").unwrap()[2] - 0.0023).abs() < 1e-12);
    }

    #[test]
    fn date_filter_applies_after_parsing() {
        let range = DateRange::parse(Some("1926-08"), Some("1926-08")).unwrap();
        let t = normalize_factors(FF3_TEXT, FactorModel::ThreeFactor, &range).unwrap();
        assert_eq!(t.len(), 1);
        assert!((t.column("HML").unwrap()[0] - 0.0382).abs() < 1e-12);
    }

    #[test]
    fn missing_marker_is_malformed() {
        let text = FF3_TEXT.replace("Annual Factors", "Yearly Factors");
        assert!(matches!(
            normalize_factors(&text, FactorModel::ThreeFactor, &DateRange::all()),
            Err(DataError::MalformedSource(_))
        ));
    }

    #[test]
    fn unparseable_cells_become_nan() {
        let text = FF3_TEXT.replace("-1.17", "n/a");
        let t = normalize_factors(&text, FactorModel::ThreeFactor, &DateRange::all()).unwrap();
        assert!(t.column("SMB").unwrap()[1].is_nan());
        assert!((t.column("HML").unwrap()[1] - 0.0382).abs() < 1e-12);
    }

    #[test]
    fn extracts_named_or_only_member() {
        let bytes = zip_bytes("F-F_Research_Data_Factors.csv", FF3_TEXT);
        let text = extract_member(&bytes, "F-F_Research_Data_Factors.csv").unwrap();
        assert_eq!(text, FF3_TEXT);
        let fallback = extract_member(&bytes, "renamed.csv").unwrap();
        assert_eq!(fallback, FF3_TEXT);
        assert!(matches!(
            extract_member(b"not a zip", "x.csv"),
            Err(DataError::Archive(_))
        ));
    }

    #[test]
    fn model_names_parse() {
        assert_eq!("FF5".parse::<FactorModel>().unwrap(), FactorModel::FiveFactor);
        assert_eq!(FactorModel::ThreeFactor.to_string(), "ff3");
        assert!("ff4".parse::<FactorModel>().is_err());
        assert_eq!(FactorModel::FiveFactor.canonical_names().len(), 6);
    }
}

//! TOML configuration for endpoints, HTTP client settings, and the batch
//! query source.
//!
//! Every section has defaults, so an empty file (or no file) is valid.
//!
//! ```toml
//! [http]
//! user_agent = "finlab/0.1"
//! timeout_secs = 60
//!
//! [alpha_vantage]
//! api_key = "demo"
//!
//! [crsp]
//! monthly_table = "crspm.msf"
//! names_table = "crspm.msenames"
//! chunk_size = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::data::DataError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinlabConfig {
    pub http: HttpConfig,
    pub factor_library: FactorLibraryConfig,
    pub alpha_vantage: AlphaVantageConfig,
    pub yahoo: YahooConfig,
    pub crsp: CrspConfig,
}

impl FinlabConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Settings shared by every HTTP client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Absent means requests block until the server answers.
    pub timeout_secs: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into(),
            timeout_secs: None,
        }
    }
}

impl HttpConfig {
    /// Build a blocking client from these settings.
    pub fn client(&self) -> Result<reqwest::blocking::Client, DataError> {
        reqwest::blocking::Client::builder()
            .timeout(self.timeout_secs.map(Duration::from_secs))
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorLibraryConfig {
    /// Directory holding the zipped CSV datasets.
    pub base_url: String,
}

impl Default for FactorLibraryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mba.tuck.dartmouth.edu/pages/faculty/ken.french/ftp".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaVantageConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for AlphaVantageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.alphavantage.co/query".into(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    pub base_url: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com/v8/finance/chart".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrspConfig {
    pub monthly_table: String,
    pub names_table: String,
    pub chunk_size: usize,
}

impl Default for CrspConfig {
    fn default() -> Self {
        Self {
            monthly_table: "crspm.msf".into(),
            names_table: "crspm.msenames".into(),
            chunk_size: crate::data::batcher::DEFAULT_CHUNK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = FinlabConfig::from_toml("").unwrap();
        assert_eq!(config, FinlabConfig::default());
        assert_eq!(config.crsp.chunk_size, 500);
        assert!(config.http.timeout_secs.is_none());
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = FinlabConfig::from_toml(
            r#"
            [alpha_vantage]
            api_key = "demo"

            [crsp]
            chunk_size = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.alpha_vantage.api_key.as_deref(), Some("demo"));
        assert_eq!(config.alpha_vantage.base_url, AlphaVantageConfig::default().base_url);
        assert_eq!(config.crsp.chunk_size, 250);
        assert_eq!(config.crsp.monthly_table, "crspm.msf");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\ntimeout_secs = 45").unwrap();
        let config = FinlabConfig::from_file(file.path()).unwrap();
        assert_eq!(config.http.timeout_secs, Some(45));
    }

    #[test]
    fn reports_bad_input() {
        assert!(matches!(
            FinlabConfig::from_toml("[crsp]\nchunk_size = \"many\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            FinlabConfig::from_file(Path::new("/definitely/not/here.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}

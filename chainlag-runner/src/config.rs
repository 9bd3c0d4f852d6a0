//! Serializable analysis configuration.
//!
//! Parsed from TOML. Everything except `[analysis]` has defaults. The API key
//! is configuration input only: it is read from the file or from
//! `ETHERSCAN_API_KEY`, and never serialized back out.

use chainlag_core::data::{coingecko, etherscan, RetryPolicy, ETHER_DECIMALS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable consulted when the file carries no API key.
pub const API_KEY_ENV: &str = "ETHERSCAN_API_KEY";

/// Unique identifier for an analysis run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("missing Etherscan API key: set [etherscan] api_key or ETHERSCAN_API_KEY")]
    MissingApiKey,
}

/// Which on-chain metric to correlate against price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Daily transaction count (`dailytx`).
    DailyTx,
    /// Total ether supply, one snapshot per day (`ethsupply`).
    TotalSupply,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::DailyTx => "daily_tx",
            MetricKind::TotalSupply => "total_supply",
        }
    }

    /// Column label for tables and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::DailyTx => "Transaction Count",
            MetricKind::TotalSupply => "Total Supply (Ether)",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "daily_tx" | "dailytx" => Ok(MetricKind::DailyTx),
            "total_supply" | "supply" => Ok(MetricKind::TotalSupply),
            other => Err(ConfigError::Invalid(format!(
                "unknown metric '{other}'. Valid: daily_tx, total_supply"
            ))),
        }
    }
}

/// Full analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub etherscan: EtherscanSection,
    #[serde(default)]
    pub coingecko: CoinGeckoSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSection {
    /// First day (inclusive).
    pub start_date: NaiveDate,
    /// Last day (inclusive).
    pub end_date: NaiveDate,
    #[serde(default = "default_metric")]
    pub metric: MetricKind,
}

fn default_metric() -> MetricKind {
    MetricKind::DailyTx
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EtherscanSection {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Decimal places of the smallest denomination (18 for wei).
    pub unit_decimals: u32,
}

impl Default for EtherscanSection {
    fn default() -> Self {
        Self {
            base_url: etherscan::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            unit_decimals: ETHER_DECIMALS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoinGeckoSection {
    pub base_url: String,
    pub coin_id: String,
    pub vs_currency: String,
}

impl Default for CoinGeckoSection {
    fn default() -> Self {
        Self {
            base_url: coingecko::DEFAULT_BASE_URL.to_string(),
            coin_id: "ethereum".to_string(),
            vs_currency: "usd".to_string(),
        }
    }
}

/// Rate limiting and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchSection {
    pub min_interval_ms: u64,
    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub rate_limit_wait_secs: u64,
    pub jitter_ms: u64,
    /// Pause between the metric source and the price source.
    pub source_pause_secs: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            min_interval_ms: 200,
            max_attempts: 3,
            backoff_secs: 5,
            rate_limit_wait_secs: 60,
            jitter_ms: 0,
            source_pause_secs: 2,
        }
    }
}

impl FetchSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_secs(self.backoff_secs),
            rate_limit_wait: Duration::from_secs(self.rate_limit_wait_secs),
            jitter: Duration::from_millis(self.jitter_ms),
        }
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn source_pause(&self) -> Duration {
        Duration::from_secs(self.source_pause_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
        }
    }
}

impl AnalysisConfig {
    /// Config for a date range with every other section at its default.
    pub fn for_range(start_date: NaiveDate, end_date: NaiveDate, metric: MetricKind) -> Self {
        Self {
            analysis: AnalysisSection {
                start_date,
                end_date,
                metric,
            },
            etherscan: EtherscanSection::default(),
            coingecko: CoinGeckoSection::default(),
            fetch: FetchSection::default(),
            output: OutputSection::default(),
        }
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.analysis;
        if a.start_date > a.end_date {
            return Err(ConfigError::Invalid(format!(
                "start_date {} is after end_date {}",
                a.start_date, a.end_date
            )));
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid("fetch.max_attempts must be at least 1".into()));
        }
        if self.etherscan.unit_decimals > 38 {
            return Err(ConfigError::Invalid(format!(
                "etherscan.unit_decimals {} exceeds 38",
                self.etherscan.unit_decimals
            )));
        }
        if matches!(&self.etherscan.api_key, Some(k) if k.trim().is_empty()) {
            return Err(ConfigError::Invalid("etherscan.api_key is empty".into()));
        }
        Ok(())
    }

    /// API key from the file, falling back to `ETHERSCAN_API_KEY`.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key_with(std::env::var(API_KEY_ENV).ok())
    }

    /// Same as `resolve_api_key`, with the environment value passed in.
    pub fn resolve_api_key_with(&self, env_value: Option<String>) -> Result<String, ConfigError> {
        self.etherscan
            .api_key
            .clone()
            .or(env_value)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    /// Deterministic hash of the configuration (API key excluded).
    ///
    /// Two runs with identical settings share a RunId.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

//! Etherscan statistics adapters.
//!
//! Etherscan wraps every answer in `{status, message, result}` and reports
//! logical failures with `status = "0"` under HTTP 200, so the envelope has
//! to be checked on top of the HTTP status.
//!
//! Two series are available:
//! - daily transaction count, one ranged `dailytx` request
//! - total ether supply, one `ethsupply` snapshot request per day
//!
//! Both validate the API key with a pre-flight `ethsupply` call before bulk
//! fetching.

use super::fetcher::RateLimitedFetcher;
use super::retry::{Attempt, RetryCause, Wait};
use super::source::{check_range, DataError, SeriesSource, SourceKind};
use super::transport::{redact_url, RawResponse};
use crate::domain::{TimeSeries, TimeSeriesPoint};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.etherscan.io/api";

/// Wei per ether.
pub const ETHER_DECIMALS: u32 = 18;

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Value,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl Envelope {
    fn is_ok(&self) -> bool {
        match &self.status {
            Value::String(s) => s == "1",
            Value::Number(n) => n.as_u64() == Some(1),
            _ => false,
        }
    }

    /// The failure is about the API key ("Invalid API Key", "Missing/Invalid
    /// API Key"), as opposed to throttling or a bad query.
    fn rejects_key(&self) -> bool {
        let detail = match &self.result {
            Value::String(detail) => detail.as_str(),
            _ => "",
        };
        [self.message.as_str(), detail]
            .iter()
            .any(|text| text.to_ascii_lowercase().contains("api key"))
    }

    /// Failure text: `message`, plus `result` when it is a string
    /// (Etherscan puts the real reason there, e.g. "Invalid API Key").
    fn failure_reason(&self) -> String {
        match &self.result {
            Value::String(detail) if !detail.is_empty() => format!("{} ({detail})", self.message),
            _ if self.message.is_empty() => "unknown error".to_string(),
            _ => self.message.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DailyTxRow {
    #[serde(rename = "UTCDate")]
    utc_date: String,
    #[serde(rename = "transactionCount", alias = "value")]
    count: Numeric,
}

/// Etherscan sends numbers both as JSON numbers and as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Numeric::Number(n) => Some(*n),
            Numeric::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Convert a smallest-denomination integer string to whole units.
///
/// Splits into whole and fractional parts over `u128` so values larger than
/// `u64` (total supply in wei is ~1.2e26) keep their precision.
pub fn scale_integer(raw: &str, decimals: u32) -> Option<f64> {
    let value: u128 = raw.trim().parse().ok()?;
    let divisor = 10u128.checked_pow(decimals)?;
    let whole = value / divisor;
    let frac = value % divisor;
    Some(whole as f64 + frac as f64 / divisor as f64)
}

/// Shared connection details for the Etherscan adapters.
#[derive(Clone)]
pub struct EtherscanClient {
    fetcher: Arc<RateLimitedFetcher>,
    base_url: String,
    api_key: String,
}

impl EtherscanClient {
    pub fn new(
        fetcher: Arc<RateLimitedFetcher>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, params: &[(&str, &str)]) -> Result<String, DataError> {
        let mut all: Vec<(&str, &str)> = params.to_vec();
        all.push(("apikey", self.api_key.as_str()));
        reqwest::Url::parse_with_params(&self.base_url, &all)
            .map(String::from)
            .map_err(|e| DataError::InvalidEndpoint(format!("{}: {e}", self.base_url)))
    }

    /// Pre-flight check: an `ethsupply` call must come back with status "1".
    ///
    /// Transport problems and envelope failures that do not concern the key
    /// (e.g. "Max rate limit reached") are retried by the fetcher. A rejected
    /// key is a `DataError::Credential` and is never retried.
    pub fn verify_api_key(&self) -> Result<(), DataError> {
        let url = self.url(&[("module", "stats"), ("action", "ethsupply")])?;
        tracing::info!("verifying Etherscan API key");
        self.fetch_result(&url).map(|_| ())
    }

    /// Request `url` and return the envelope's `result` once status is "1".
    /// Envelope failures naming the key are fatal; any other failure is
    /// retried within the fetcher's attempt budget.
    fn fetch_result(&self, url: &str) -> Result<Value, DataError> {
        let endpoint = redact_url(url);
        self.fetcher.fetch_with(url, &[], |resp| {
            let envelope = match parse_envelope(&endpoint, &resp) {
                Ok(envelope) => envelope,
                Err(e) => return Attempt::Fatal(e),
            };
            if envelope.is_ok() {
                Attempt::Done(envelope.result)
            } else if envelope.rejects_key() {
                Attempt::Fatal(DataError::Credential {
                    endpoint: endpoint.clone(),
                    message: envelope.failure_reason(),
                })
            } else {
                Attempt::retry(RetryCause::Envelope(envelope.failure_reason()), Wait::Backoff)
            }
        })
    }

    /// Current total supply in whole units.
    pub fn supply_snapshot(&self, decimals: u32) -> Result<f64, DataError> {
        let url = self.url(&[("module", "stats"), ("action", "ethsupply")])?;
        let result = self.fetch_result(&url)?;
        parse_supply(&redact_url(&url), &result, decimals)
    }
}

fn parse_envelope(endpoint: &str, resp: &RawResponse) -> Result<Envelope, DataError> {
    resp.json::<Envelope>().map_err(|e| DataError::Upstream {
        endpoint: endpoint.to_string(),
        message: format!("malformed envelope: {e}: {}", resp.body_snippet()),
    })
}

fn parse_supply(endpoint: &str, result: &Value, decimals: u32) -> Result<f64, DataError> {
    let raw = match result {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(DataError::Upstream {
                endpoint: endpoint.to_string(),
                message: format!("unexpected supply result: {other}"),
            })
        }
    };
    scale_integer(&raw, decimals).ok_or_else(|| DataError::Upstream {
        endpoint: endpoint.to_string(),
        message: format!("supply is not an integer: {raw}"),
    })
}

fn parse_daily_tx(endpoint: &str, result: Value) -> Result<Vec<TimeSeriesPoint>, DataError> {
    let upstream = |message: String| DataError::Upstream {
        endpoint: endpoint.to_string(),
        message,
    };

    let rows: Vec<DailyTxRow> = serde_json::from_value(result)
        .map_err(|e| upstream(format!("unexpected dailytx result: {e}")))?;

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let date = NaiveDate::parse_from_str(row.utc_date.trim(), "%Y-%m-%d")
            .map_err(|e| upstream(format!("bad UTCDate '{}': {e}", row.utc_date)))?;
        let count = row
            .count
            .as_f64()
            .ok_or_else(|| upstream(format!("bad transaction count on {date}")))?;
        points.push(TimeSeriesPoint::new(date, count));
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

/// Daily transaction count from the `dailytx` statistics endpoint.
pub struct EtherscanDailyTxSource {
    client: EtherscanClient,
}

impl EtherscanDailyTxSource {
    pub fn new(client: EtherscanClient) -> Self {
        Self { client }
    }
}

impl SeriesSource for EtherscanDailyTxSource {
    fn name(&self) -> &str {
        "etherscan_dailytx"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::EtherscanDailyTx
    }

    fn fetch_series(&self, start: NaiveDate, end: NaiveDate) -> Result<TimeSeries, DataError> {
        check_range(start, end)?;
        self.client.verify_api_key()?;

        let start_s = start.format("%Y-%m-%d").to_string();
        let end_s = end.format("%Y-%m-%d").to_string();
        let url = self.client.url(&[
            ("module", "stats"),
            ("action", "dailytx"),
            ("startdate", start_s.as_str()),
            ("enddate", end_s.as_str()),
            ("sort", "asc"),
        ])?;

        tracing::info!(%start, %end, "fetching daily transaction counts");
        let result = self.client.fetch_result(&url)?;
        let points = parse_daily_tx(&redact_url(&url), result)?;
        let series = TimeSeries::new(points)?.restrict(start, end);
        tracing::info!(days = series.len(), "transaction counts received");
        Ok(series)
    }
}

/// Total supply, one snapshot request per calendar day in the range.
///
/// `ethsupply` has no date parameter, so each day is labelled with the
/// snapshot taken while iterating over it.
pub struct EtherscanSupplySource {
    client: EtherscanClient,
    decimals: u32,
}

impl EtherscanSupplySource {
    pub fn new(client: EtherscanClient, decimals: u32) -> Self {
        Self { client, decimals }
    }
}

impl SeriesSource for EtherscanSupplySource {
    fn name(&self) -> &str {
        "etherscan_supply"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::EtherscanSupply
    }

    fn fetch_series(&self, start: NaiveDate, end: NaiveDate) -> Result<TimeSeries, DataError> {
        check_range(start, end)?;
        self.client.verify_api_key()?;

        let mut points = Vec::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            let supply = self.client.supply_snapshot(self.decimals)?;
            tracing::debug!(%date, supply, "supply snapshot");
            points.push(TimeSeriesPoint::new(date, supply));
        }
        tracing::info!(days = points.len(), "supply snapshots received");
        Ok(TimeSeries::new(points)?)
    }
}

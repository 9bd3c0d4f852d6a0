//! Series source trait and structured error types.
//!
//! The SeriesSource trait abstracts over the upstream APIs (Etherscan stats,
//! CoinGecko market chart) so the pipeline never sees HTTP, and so tests can
//! substitute an in-memory series.

use crate::domain::{SeriesError, TimeSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error types for data operations.
///
/// Every variant names the (redacted) endpoint so failures can be diagnosed
/// from the message alone.
#[derive(Debug, Error)]
pub enum DataError {
    /// Transport failure or unresolved rate limit after all retries.
    #[error("fetch failed for {endpoint} after {attempts} attempt(s): {last}")]
    Fetch {
        endpoint: String,
        attempts: u32,
        last: String,
    },

    /// The response envelope reported failure, or an expected field is missing.
    #[error("upstream error from {endpoint}: {message}")]
    Upstream { endpoint: String, message: String },

    /// The API key was rejected. Never retried.
    #[error("credential rejected by {endpoint}: {message}")]
    Credential { endpoint: String, message: String },

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("series error: {0}")]
    Series(#[from] SeriesError),
}

impl DataError {
    /// True for errors that mean the configured API key is unusable.
    pub fn is_credential(&self) -> bool {
        matches!(self, DataError::Credential { .. })
    }
}

/// Which upstream a series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    EtherscanDailyTx,
    EtherscanSupply,
    CoinGecko,
    Static,
}

/// Trait for daily series sources.
///
/// Implementations return one point per calendar day inside `[start, end]`,
/// ascending. A failure is fatal for the source; callers do not continue with
/// partial data.
pub trait SeriesSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Fetch the daily series for an inclusive date range.
    fn fetch_series(&self, start: NaiveDate, end: NaiveDate) -> Result<TimeSeries, DataError>;
}

/// Reject ranges whose start is after their end.
pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), DataError> {
    if start > end {
        return Err(DataError::InvalidRange { start, end });
    }
    Ok(())
}

/// In-memory source serving a fixed series, restricted to the requested range.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    series: TimeSeries,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, series: TimeSeries) -> Self {
        Self {
            name: name.into(),
            series,
        }
    }
}

impl SeriesSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Static
    }

    fn fetch_series(&self, start: NaiveDate, end: NaiveDate) -> Result<TimeSeries, DataError> {
        check_range(start, end)?;
        Ok(self.series.clone().restrict(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = check_range(d("2024-02-01"), d("2024-01-01")).unwrap_err();
        assert!(matches!(err, DataError::InvalidRange { .. }));
    }

    #[test]
    fn static_source_restricts_to_range() {
        let series = TimeSeries::from_daily_samples(vec![
            (d("2024-01-01"), 1.0),
            (d("2024-01-02"), 2.0),
            (d("2024-01-03"), 3.0),
        ]);
        let source = StaticSource::new("fixture", series);
        let got = source.fetch_series(d("2024-01-02"), d("2024-01-03")).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got.first_date(), Some(d("2024-01-02")));
    }

    #[test]
    fn credential_errors_are_flagged() {
        let err = DataError::Credential {
            endpoint: "x".into(),
            message: "Invalid API Key".into(),
        };
        assert!(err.is_credential());
        assert!(err.to_string().contains("Invalid API Key"));
    }
}

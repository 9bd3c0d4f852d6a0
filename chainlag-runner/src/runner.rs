//! Analysis runner — wires config, fetcher, sources, and the pipeline.
//!
//! Entry points:
//! - `build_fetcher()` / `build_sources()`: turn an `AnalysisConfig` into the
//!   shared rate-limited fetcher and the metric + price adapters.
//! - `run_analysis()`: fetch both series, correlate, build the report. Used by
//!   the CLI and by tests with in-memory sources.
//! - `verify_api_key()`: the pre-flight key check on its own.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chainlag_core::data::{
    Clock, CoinGeckoPriceSource, DataError, EtherscanClient, EtherscanDailyTxSource,
    EtherscanSupplySource, RateLimitedFetcher, ReqwestTransport, SeriesSource, SourceKind,
    SystemClock,
};
use chainlag_core::domain::{CorrelationResult, MergedTable};
use chainlag_core::pipeline::{correlate, AnalysisError};

use crate::config::{AnalysisConfig, ConfigError, MetricKind, RunId};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("metric source '{name}' failed: {error}")]
    MetricSource {
        name: String,
        #[source]
        error: DataError,
    },
    #[error("price source '{name}' failed: {error}")]
    PriceSource {
        name: String,
        #[source]
        error: DataError,
    },
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

impl RunError {
    /// The run completed but left nothing to correlate.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, RunError::Analysis(AnalysisError::EmptyResult(_)))
    }

    pub fn is_credential(&self) -> bool {
        match self {
            RunError::MetricSource { error, .. } | RunError::PriceSource { error, .. } => {
                error.is_credential()
            }
            _ => false,
        }
    }
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Summary of one run, persisted as `report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub metric: MetricKind,
    pub metric_source: SourceKind,
    pub price_source: SourceKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Days returned by each source before the join.
    pub metric_days: usize,
    pub price_days: usize,
    pub joined_rows: usize,
    pub return_rows: usize,
    pub correlation: CorrelationResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Report plus the merged table it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub report: AnalysisReport,
    pub table: MergedTable,
}

/// The two adapters one run reads from.
pub struct Sources {
    pub metric: Box<dyn SeriesSource>,
    pub price: Box<dyn SeriesSource>,
}

/// Real-network fetcher with the configured spacing and retry policy.
pub fn build_fetcher(config: &AnalysisConfig) -> Arc<RateLimitedFetcher> {
    Arc::new(RateLimitedFetcher::new(
        Arc::new(ReqwestTransport::new()),
        Arc::new(SystemClock),
        config.fetch.min_interval(),
        config.fetch.retry_policy(),
    ))
}

fn etherscan_client(
    config: &AnalysisConfig,
    fetcher: &Arc<RateLimitedFetcher>,
    api_key: &str,
) -> EtherscanClient {
    EtherscanClient::new(fetcher.clone(), config.etherscan.base_url.as_str(), api_key)
}

/// Metric adapter chosen by `analysis.metric`, plus the CoinGecko price
/// adapter. Both share `fetcher`, so one rate bound covers the whole run.
pub fn build_sources(
    config: &AnalysisConfig,
    fetcher: Arc<RateLimitedFetcher>,
    api_key: &str,
) -> Sources {
    let client = etherscan_client(config, &fetcher, api_key);
    let metric: Box<dyn SeriesSource> = match config.analysis.metric {
        MetricKind::DailyTx => Box::new(EtherscanDailyTxSource::new(client)),
        MetricKind::TotalSupply => Box::new(EtherscanSupplySource::new(
            client,
            config.etherscan.unit_decimals,
        )),
    };
    let cg = &config.coingecko;
    let price = Box::new(CoinGeckoPriceSource::new(
        fetcher,
        cg.base_url.as_str(),
        cg.coin_id.as_str(),
        cg.vs_currency.as_str(),
    ));
    Sources { metric, price }
}

/// Run the full analysis against the given sources.
///
/// The metric series is fetched first, then `clock` pauses for
/// `fetch.source_pause_secs`, then the price series. Any source error
/// aborts the run.
pub fn run_analysis(
    config: &AnalysisConfig,
    metric_source: &dyn SeriesSource,
    price_source: &dyn SeriesSource,
    clock: &dyn Clock,
) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let (start, end) = (config.analysis.start_date, config.analysis.end_date);

    tracing::info!(source = metric_source.name(), %start, %end, "fetching metric series");
    let metric = metric_source
        .fetch_series(start, end)
        .map_err(|error| RunError::MetricSource {
            name: metric_source.name().to_string(),
            error,
        })?;

    clock.sleep(config.fetch.source_pause());

    tracing::info!(source = price_source.name(), %start, %end, "fetching price series");
    let price = price_source
        .fetch_series(start, end)
        .map_err(|error| RunError::PriceSource {
            name: price_source.name().to_string(),
            error,
        })?;

    let analysis = correlate(&metric, &price)?;
    let report = AnalysisReport {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        metric: config.analysis.metric,
        metric_source: metric_source.kind(),
        price_source: price_source.kind(),
        start_date: start,
        end_date: end,
        metric_days: metric.len(),
        price_days: price.len(),
        joined_rows: analysis.table.len(),
        return_rows: analysis.table.return_count(),
        correlation: analysis.correlation,
    };
    tracing::info!(
        joined = report.joined_rows,
        same_day = ?report.correlation.same_day,
        lagged = ?report.correlation.next_day_lagged,
        "analysis complete"
    );

    Ok(RunOutcome {
        report,
        table: analysis.table,
    })
}

/// Pre-flight only: confirm Etherscan accepts `api_key`.
pub fn verify_api_key(
    config: &AnalysisConfig,
    fetcher: Arc<RateLimitedFetcher>,
    api_key: &str,
) -> Result<(), DataError> {
    etherscan_client(config, &fetcher, api_key).verify_api_key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlag_core::data::{MockClock, StaticSource};
    use chainlag_core::domain::{TimeSeries, TimeSeriesPoint};
    use chainlag_core::pipeline::EmptyReason;
    use std::time::Duration;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn series(start: &str, values: &[f64]) -> TimeSeries {
        TimeSeries::new(
            d(start)
                .iter_days()
                .zip(values)
                .map(|(date, v)| TimeSeriesPoint::new(date, *v))
                .collect(),
        )
        .unwrap()
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig::for_range(d("2024-01-01"), d("2024-01-03"), MetricKind::DailyTx)
    }

    #[test]
    fn worked_example_report() {
        let metric = StaticSource::new("tx", series("2024-01-01", &[5.0, 7.0, 3.0]));
        let price = StaticSource::new("px", series("2024-01-01", &[100.0, 110.0, 99.0]));
        let clock = MockClock::new();

        let outcome = run_analysis(&config(), &metric, &price, &clock).unwrap();
        let r = &outcome.report;
        assert_eq!(r.schema_version, SCHEMA_VERSION);
        assert_eq!(r.metric_days, 3);
        assert_eq!(r.joined_rows, 3);
        assert_eq!(r.return_rows, 2);
        assert_eq!(r.metric_source, SourceKind::Static);
        assert!((r.correlation.same_day.unwrap() - 1.0).abs() < 1e-9);
        assert!((r.correlation.next_day_lagged.unwrap() + 1.0).abs() < 1e-9);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(2)]);
    }

    #[test]
    fn invalid_config_fetches_nothing() {
        let metric = StaticSource::new("tx", series("2024-01-01", &[1.0]));
        let price = StaticSource::new("px", series("2024-01-01", &[1.0]));
        let mut cfg = config();
        cfg.analysis.start_date = d("2024-02-01");
        let clock = MockClock::new();

        let err = run_analysis(&cfg, &metric, &price, &clock).unwrap_err();
        assert!(matches!(err, RunError::Config(_)));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn empty_result_is_flagged() {
        let metric = StaticSource::new("tx", series("2024-01-01", &[1.0, 2.0, 3.0]));
        let price = StaticSource::new("px", TimeSeries::default());

        let err = run_analysis(&config(), &metric, &price, &MockClock::new()).unwrap_err();
        assert!(err.is_empty_result());
        assert!(matches!(
            err,
            RunError::Analysis(AnalysisError::EmptyResult(EmptyReason::PriceSeriesEmpty))
        ));
    }

    #[test]
    fn credential_errors_are_recognised() {
        let err = RunError::MetricSource {
            name: "etherscan_dailytx".into(),
            error: DataError::Credential {
                endpoint: "e".into(),
                message: "Invalid API Key".into(),
            },
        };
        assert!(err.is_credential());
        assert!(!err.is_empty_result());
    }

    #[test]
    fn report_json_omits_nothing_needed_downstream() {
        let metric = StaticSource::new("tx", series("2024-01-01", &[5.0, 7.0, 3.0]));
        let price = StaticSource::new("px", series("2024-01-01", &[100.0, 110.0, 99.0]));
        let outcome = run_analysis(&config(), &metric, &price, &MockClock::new()).unwrap();

        let json = serde_json::to_string(&outcome.report).unwrap();
        let back: AnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome.report);
        assert!(json.contains("\"metric\":\"daily_tx\""));
    }
}

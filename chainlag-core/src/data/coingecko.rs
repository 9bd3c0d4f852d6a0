//! CoinGecko market-chart price adapter.
//!
//! The range endpoint returns `{prices: [[timestamp_ms, price], ...]}` with
//! hourly or finer samples depending on range length. Samples are grouped by
//! UTC calendar day and averaged into one price per day.

use super::fetcher::RateLimitedFetcher;
use super::retry::Attempt;
use super::source::{check_range, DataError, SeriesSource, SourceKind};
use super::transport::RawResponse;
use crate::domain::TimeSeries;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

const HEADERS: [(&str, &str); 2] = [
    ("Accept", "application/json"),
    ("User-Agent", "Mozilla/5.0"),
];

/// Daily average price of one coin in one quote currency.
pub struct CoinGeckoPriceSource {
    fetcher: Arc<RateLimitedFetcher>,
    base_url: String,
    coin_id: String,
    vs_currency: String,
}

impl CoinGeckoPriceSource {
    pub fn new(
        fetcher: Arc<RateLimitedFetcher>,
        base_url: impl Into<String>,
        coin_id: impl Into<String>,
        vs_currency: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            coin_id: coin_id.into(),
            vs_currency: vs_currency.into(),
        }
    }

    /// Range URL covering `start 00:00:00` to `end 23:59:59` UTC.
    fn range_url(&self, start: NaiveDate, end: NaiveDate) -> Result<String, DataError> {
        let from = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let to = end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
        let base = format!(
            "{}/coins/{}/market_chart/range",
            self.base_url.trim_end_matches('/'),
            self.coin_id
        );
        let (from, to) = (from.to_string(), to.to_string());
        reqwest::Url::parse_with_params(
            &base,
            &[
                ("vs_currency", self.vs_currency.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ],
        )
        .map(String::from)
        .map_err(|e| DataError::InvalidEndpoint(format!("{base}: {e}")))
    }
}

/// Extract `(day, price)` samples from a market-chart body.
fn parse_prices(endpoint: &str, resp: &RawResponse) -> Result<Vec<(NaiveDate, f64)>, DataError> {
    let upstream = |message: String| DataError::Upstream {
        endpoint: endpoint.to_string(),
        message,
    };

    let body: Value = resp
        .json()
        .map_err(|e| upstream(format!("malformed response: {e}: {}", resp.body_snippet())))?;

    let prices = body
        .get("prices")
        .and_then(Value::as_array)
        .ok_or_else(|| upstream(format!("response has no `prices` field: {}", resp.body_snippet())))?;

    let mut samples = Vec::with_capacity(prices.len());
    for entry in prices {
        let pair = entry.as_array().filter(|p| p.len() >= 2);
        let (ts, price) = match pair.map(|p| (p[0].as_f64(), p[1].as_f64())) {
            Some((Some(ts), Some(price))) => (ts, price),
            // CoinGecko occasionally emits null prices; skip them.
            Some((Some(_), None)) => continue,
            _ => return Err(upstream(format!("bad price sample: {entry}"))),
        };
        let date = DateTime::from_timestamp_millis(ts as i64)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| upstream(format!("invalid timestamp: {ts}")))?;
        samples.push((date, price));
    }
    Ok(samples)
}

impl SeriesSource for CoinGeckoPriceSource {
    fn name(&self) -> &str {
        "coingecko_market_chart"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::CoinGecko
    }

    fn fetch_series(&self, start: NaiveDate, end: NaiveDate) -> Result<TimeSeries, DataError> {
        check_range(start, end)?;
        let url = self.range_url(start, end)?;

        tracing::info!(coin = %self.coin_id, vs = %self.vs_currency, %start, %end, "fetching prices");
        let samples = self.fetcher.fetch_with(&url, &HEADERS, |resp| {
            match parse_prices(&url, &resp) {
                Ok(samples) => Attempt::Done(samples),
                Err(e) => Attempt::Fatal(e),
            }
        })?;

        let sample_count = samples.len();
        let series = TimeSeries::from_daily_samples(samples).restrict(start, end);
        tracing::info!(samples = sample_count, days = series.len(), "prices received");
        Ok(series)
    }
}

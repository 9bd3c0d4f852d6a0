//! End-to-end: scripted Etherscan + CoinGecko responses through one shared
//! fetcher, into the correlation pipeline.

use chainlag_core::data::{
    etherscan, coingecko, CoinGeckoPriceSource, DataError, EtherscanClient,
    EtherscanDailyTxSource, EtherscanSupplySource, MockClock, RateLimitedFetcher, RawResponse,
    RetryPolicy, ScriptedTransport, SeriesSource, TransportError, DEFAULT_MIN_INTERVAL,
    ETHER_DECIMALS,
};
use chainlag_core::pipeline::correlate;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

const SUPPLY_OK: &str = r#"{"status":"1","message":"OK","result":"1000000000000000000"}"#;

const DAILY_TX: &str = r#"{"status":"1","message":"OK","result":[
    {"UTCDate":"2022-12-01","unixTimeStamp":"1669852800","transactionCount":5},
    {"UTCDate":"2022-12-02","unixTimeStamp":"1669939200","transactionCount":7},
    {"UTCDate":"2022-12-03","unixTimeStamp":"1670025600","transactionCount":3}
]}"#;

// Two intraday samples per day averaging to 100, 110, 99.
const PRICES: &str = r#"{"prices":[
    [1669852800000, 95.0], [1669896000000, 105.0],
    [1669939200000, 110.0],
    [1670025600000, 98.0], [1670068800000, 100.0]
]}"#;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

struct Harness {
    clock: Arc<MockClock>,
    transport: Arc<ScriptedTransport>,
    fetcher: Arc<RateLimitedFetcher>,
}

fn harness() -> Harness {
    let clock = Arc::new(MockClock::new());
    let transport = Arc::new(ScriptedTransport::new(clock.clone()));
    let fetcher = Arc::new(RateLimitedFetcher::new(
        transport.clone(),
        clock.clone(),
        DEFAULT_MIN_INTERVAL,
        RetryPolicy::default(),
    ));
    Harness {
        clock,
        transport,
        fetcher,
    }
}

fn etherscan_client(h: &Harness) -> EtherscanClient {
    EtherscanClient::new(h.fetcher.clone(), etherscan::DEFAULT_BASE_URL, "TESTKEY")
}

fn price_source(h: &Harness) -> CoinGeckoPriceSource {
    CoinGeckoPriceSource::new(h.fetcher.clone(), coingecko::DEFAULT_BASE_URL, "ethereum", "usd")
}

#[test]
fn daily_tx_against_price_matches_worked_example() {
    let h = harness();
    h.transport
        .push(RawResponse::ok(SUPPLY_OK))
        .push(RawResponse::ok(DAILY_TX))
        .push(RawResponse::ok(PRICES));

    let metric = EtherscanDailyTxSource::new(etherscan_client(&h))
        .fetch_series(d("2022-12-01"), d("2022-12-03"))
        .unwrap();
    let price = price_source(&h)
        .fetch_series(d("2022-12-01"), d("2022-12-03"))
        .unwrap();

    let analysis = correlate(&metric, &price).unwrap();
    assert_eq!(analysis.table.len(), 3);
    let returns: Vec<_> = analysis
        .table
        .records
        .iter()
        .map(|r| r.derived_return)
        .collect();
    assert_eq!(returns, vec![None, Some(0.10), Some(-0.10)]);
    assert!((analysis.correlation.same_day.unwrap() - 1.0).abs() < 1e-9);
    assert!((analysis.correlation.next_day_lagged.unwrap() + 1.0).abs() < 1e-9);

    // one fetcher for both sources: every gap respects the rate limit
    let requests = h.transport.requests();
    assert_eq!(requests.len(), 3);
    for pair in requests.windows(2) {
        assert!(pair[1].started - pair[0].finished >= DEFAULT_MIN_INTERVAL);
    }
}

#[test]
fn supply_snapshots_convert_wei() {
    let h = harness();
    for _ in 0..3 {
        h.transport.push(RawResponse::ok(SUPPLY_OK));
    }

    let series = EtherscanSupplySource::new(etherscan_client(&h), ETHER_DECIMALS)
        .fetch_series(d("2022-12-01"), d("2022-12-02"))
        .unwrap();
    assert_eq!(series.len(), 2);
    assert!(series.points().iter().all(|p| p.value == 1.0));
}

#[test]
fn price_source_recovers_from_transport_failure() {
    let h = harness();
    h.transport
        .push_error(TransportError::Timeout("read timed out".into()))
        .push(RawResponse::ok(PRICES));

    let series = price_source(&h)
        .fetch_series(d("2022-12-01"), d("2022-12-03"))
        .unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(5)]);
}

#[test]
fn credential_failure_aborts_before_bulk_fetch() {
    let h = harness();
    h.transport.push(RawResponse::ok(
        r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#,
    ));

    let err = EtherscanDailyTxSource::new(etherscan_client(&h))
        .fetch_series(d("2022-12-01"), d("2022-12-03"))
        .unwrap_err();
    assert!(matches!(err, DataError::Credential { .. }));
    assert_eq!(h.transport.request_count(), 1);
    assert!(!err.to_string().contains("TESTKEY"));
}

#[test]
fn inverted_range_makes_no_requests() {
    let h = harness();
    let err = price_source(&h)
        .fetch_series(d("2022-12-03"), d("2022-12-01"))
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidRange { .. }));
    assert_eq!(h.transport.request_count(), 0);
}

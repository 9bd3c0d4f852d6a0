//! Data acquisition: transport, rate-limited fetcher, and upstream adapters

pub mod clock;
pub mod coingecko;
pub mod etherscan;
pub mod fetcher;
pub mod retry;
pub mod source;
pub mod transport;

pub use clock::{Clock, MockClock, SystemClock};
pub use coingecko::CoinGeckoPriceSource;
pub use etherscan::{
    scale_integer, EtherscanClient, EtherscanDailyTxSource, EtherscanSupplySource, ETHER_DECIMALS,
};
pub use fetcher::{RateLimitedFetcher, DEFAULT_MIN_INTERVAL};
pub use retry::{run_with_retry, Attempt, RetryCause, RetryPolicy, Wait};
pub use source::{check_range, DataError, SeriesSource, SourceKind, StaticSource};
pub use transport::{
    HttpTransport, RawResponse, RecordedRequest, ReqwestTransport, ScriptedTransport,
    TransportError,
};

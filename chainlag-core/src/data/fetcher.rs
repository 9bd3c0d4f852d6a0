//! Rate-limited, retrying HTTP fetcher.
//!
//! One fetcher instance is shared by every source of a run. It enforces a
//! minimum gap between the end of one request and the start of the next, and
//! classifies HTTP outcomes for the retry driver:
//!
//! | outcome            | handling                                  |
//! |--------------------|-------------------------------------------|
//! | transport failure  | retry after `backoff`                     |
//! | 429                | retry after Retry-After or `rate_limit_wait` |
//! | 5xx                | retry after `backoff`                     |
//! | 401 / 403          | fatal `DataError::Credential`             |
//! | other non-2xx      | fatal `DataError::Upstream`               |

use super::clock::{Clock, SystemClock};
use super::retry::{run_with_retry, Attempt, RetryCause, RetryPolicy, Wait};
use super::source::DataError;
use super::transport::{redact_url, HttpTransport, RawResponse, ReqwestTransport, TransportError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default spacing between requests (at most 5 requests per second).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);

pub struct RateLimitedFetcher {
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    min_interval: Duration,
    policy: RetryPolicy,
    /// When the previous response arrived. Held locked for the whole request
    /// so concurrent callers serialize through the rate bound.
    last_request: Mutex<Option<Instant>>,
}

impl RateLimitedFetcher {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
        min_interval: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            clock,
            min_interval,
            policy,
            last_request: Mutex::new(None),
        }
    }

    /// Real network, wall clock, 200 ms spacing, default retry policy.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(ReqwestTransport::new()),
            Arc::new(SystemClock),
            DEFAULT_MIN_INTERVAL,
            RetryPolicy::default(),
        )
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// One rate-limited request, no retries.
    pub fn get_once(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<RawResponse, TransportError> {
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = *last {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limiter pause");
                self.clock.sleep(wait);
            }
        }

        let result = self.transport.get(url, headers);
        *last = Some(self.clock.now());
        result
    }

    /// Rate-limited GET with retries. Any 2xx response is returned as is.
    pub fn fetch(&self, url: &str, headers: &[(&str, &str)]) -> Result<RawResponse, DataError> {
        self.fetch_with(url, headers, Attempt::Done)
    }

    /// Rate-limited GET with retries, where `interpret` decides whether a 2xx
    /// response is usable, worth retrying (e.g. an envelope failure flag) or
    /// fatal. All outcomes share one attempt budget.
    pub fn fetch_with<T, F>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        mut interpret: F,
    ) -> Result<T, DataError>
    where
        F: FnMut(RawResponse) -> Attempt<T>,
    {
        let endpoint = redact_url(url);
        run_with_retry(&self.policy, self.clock.as_ref(), &endpoint, |attempt| {
            tracing::trace!(endpoint = %endpoint, attempt, "GET");
            match self.get_once(url, headers) {
                Err(e) => Attempt::retry(RetryCause::Transport(e.to_string()), Wait::Backoff),
                Ok(resp) => match classify_status(&endpoint, resp) {
                    Ok(resp) => interpret(resp),
                    Err(outcome) => outcome,
                },
            }
        })
    }
}

/// Split off non-success statuses. `Ok` carries a 2xx response.
fn classify_status<T>(endpoint: &str, resp: RawResponse) -> Result<RawResponse, Attempt<T>> {
    match resp.status {
        s if (200..300).contains(&s) => Ok(resp),
        429 => Err(Attempt::retry(
            RetryCause::Status(429),
            Wait::RateLimited(resp.retry_after),
        )),
        401 | 403 => Err(Attempt::Fatal(DataError::Credential {
            endpoint: endpoint.to_string(),
            message: format!("HTTP {}: {}", resp.status, resp.body_snippet()),
        })),
        s if s >= 500 => Err(Attempt::retry(RetryCause::Status(s), Wait::Backoff)),
        s => Err(Attempt::Fatal(DataError::Upstream {
            endpoint: endpoint.to_string(),
            message: format!("HTTP {s}: {}", resp.body_snippet()),
        })),
    }
}

//! Retry driver with fixed backoff and Retry-After support.
//!
//! Each attempt reports an explicit `Attempt` outcome (done, retryable,
//! fatal). The driver owns the attempt budget and the waits between
//! attempts. The policy values are plain configuration.

use super::clock::Clock;
use super::source::DataError;
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Retry and backoff settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Wait after a transport failure, 5xx, or envelope failure.
    pub backoff: Duration,
    /// Wait after a 429 that carries no Retry-After header.
    pub rate_limit_wait: Duration,
    /// Upper bound of a uniform random delay added to every wait.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
            rate_limit_wait: Duration::from_secs(60),
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Concrete delay for a wait request, jitter included.
    pub fn delay(&self, wait: Wait) -> Duration {
        let base = match wait {
            Wait::Backoff => self.backoff,
            Wait::RateLimited(Some(hint)) => hint,
            Wait::RateLimited(None) => self.rate_limit_wait,
        };
        base + self.sample_jitter()
    }

    fn sample_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return Duration::ZERO;
        }
        rand::thread_rng().gen_range(Duration::ZERO..=self.jitter)
    }
}

/// How long to wait before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Backoff,
    /// 429 with the server's Retry-After hint, if any.
    RateLimited(Option<Duration>),
}

/// Why an attempt is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryCause {
    Transport(String),
    Status(u16),
    /// Envelope status flag reported failure.
    Envelope(String),
}

impl fmt::Display for RetryCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryCause::Transport(msg) => write!(f, "{msg}"),
            RetryCause::Status(429) => write!(f, "HTTP 429 Too Many Requests"),
            RetryCause::Status(status) => write!(f, "HTTP {status}"),
            RetryCause::Envelope(msg) => write!(f, "envelope error: {msg}"),
        }
    }
}

/// Outcome of one attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Retry { cause: RetryCause, wait: Wait },
    Fatal(DataError),
}

impl<T> Attempt<T> {
    pub fn retry(cause: RetryCause, wait: Wait) -> Self {
        Attempt::Retry { cause, wait }
    }
}

/// Run `op` until it succeeds, fails fatally, or the attempt budget is spent.
///
/// `op` receives the 1-based attempt number. There is no wait after the
/// final attempt. On exhaustion, envelope failures surface as
/// `DataError::Upstream` and everything else as `DataError::Fetch`.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    endpoint: &str,
    mut op: F,
) -> Result<T, DataError>
where
    F: FnMut(u32) -> Attempt<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_cause = None;

    for attempt in 1..=max_attempts {
        match op(attempt) {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(err) => return Err(err),
            Attempt::Retry { cause, wait } => {
                if attempt < max_attempts {
                    let delay = policy.delay(wait);
                    tracing::warn!(
                        endpoint,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed: {cause}; retrying"
                    );
                    clock.sleep(delay);
                }
                last_cause = Some(cause);
            }
        }
    }

    Err(match last_cause {
        Some(RetryCause::Envelope(message)) => DataError::Upstream {
            endpoint: endpoint.to_string(),
            message: format!("{message} (after {max_attempts} attempt(s))"),
        },
        Some(cause) => DataError::Fetch {
            endpoint: endpoint.to_string(),
            attempts: max_attempts,
            last: cause.to_string(),
        },
        None => DataError::Fetch {
            endpoint: endpoint.to_string(),
            attempts: max_attempts,
            last: "max retries exceeded".into(),
        },
    })
}

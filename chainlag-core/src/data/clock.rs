//! Time source used by the fetcher and the retry driver.
//!
//! Every delay in the data layer goes through a `Clock`, so tests can run the
//! rate limiter and the Retry-After handling against virtual time.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic time plus a blocking sleep.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Block the calling flow for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall clock: `Instant::now` and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Virtual clock. `sleep` advances time instantly and is recorded.
#[derive(Debug)]
pub struct MockClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move virtual time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += duration;
    }

    /// Virtual time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().into_iter().sum()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_sleep_advances_and_records() {
        let clock = MockClock::new();
        let t0 = clock.now();
        clock.sleep(Duration::from_secs(5));
        clock.advance(Duration::from_millis(250));

        assert_eq!(clock.now() - t0, Duration::from_millis(5250));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
        assert_eq!(clock.total_slept(), Duration::from_secs(5));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        clock.sleep(Duration::ZERO);
        assert!(clock.now() >= a);
    }
}

//! Bounded retry of whole connect-and-run cycles.

use log::{debug, warn};
use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

/// Pause between attempts.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-interval retry bounded by total elapsed time.
///
/// With no `max_wait` the operation runs exactly once. Otherwise it is
/// re-run after each retryable failure until `max_wait` has elapsed since the
/// first attempt started; the last failure is returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_wait: Option<Duration>,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

impl RetryPolicy {
    pub fn once() -> Self {
        Self {
            max_wait: None,
            interval: RETRY_INTERVAL,
        }
    }

    /// Build from the CLI `--retry` value; zero or negative disables retries.
    pub fn from_secs(max_wait: i64) -> Self {
        let max_wait = u64::try_from(max_wait)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self {
            max_wait,
            interval: RETRY_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run `operation` until it succeeds, fails with an error `retryable`
    /// rejects, or the wait budget is spent.
    pub fn run<T, E, F, C>(&self, mut operation: F, retryable: C) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
        C: Fn(&E) -> bool,
    {
        let started = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            let err = match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("operation succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let Some(max_wait) = self.max_wait else {
                return Err(err);
            };
            if !retryable(&err) || started.elapsed() >= max_wait {
                return Err(err);
            }

            warn!(
                "attempt {attempt} failed ({err}); retrying in {:?}, {:?} of {:?} elapsed",
                self.interval,
                started.elapsed(),
                max_wait
            );
            thread::sleep(self.interval);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    enum Failure {
        Transient,
        Fatal,
    }

    impl Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn is_transient(err: &Failure) -> bool {
        *err == Failure::Transient
    }

    #[test]
    fn non_positive_wait_means_single_attempt() {
        for secs in [0, -1, -30] {
            let policy = RetryPolicy::from_secs(secs);
            assert_eq!(policy.max_wait, None);

            let calls = Cell::new(0);
            let result: Result<(), Failure> = policy.run(
                || {
                    calls.set(calls.get() + 1);
                    Err(Failure::Transient)
                },
                is_transient,
            );
            assert_eq!(result, Err(Failure::Transient));
            assert_eq!(calls.get(), 1);
        }
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let policy = RetryPolicy::from_secs(30).with_interval(Duration::from_millis(1));
        let calls = Cell::new(0);
        let result = policy.run(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(Failure::Transient)
                } else {
                    Ok("done")
                }
            },
            is_transient,
        );
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn fatal_failures_are_not_retried() {
        let policy = RetryPolicy::from_secs(30).with_interval(Duration::from_millis(1));
        let calls = Cell::new(0);
        let result: Result<(), Failure> = policy.run(
            || {
                calls.set(calls.get() + 1);
                Err(Failure::Fatal)
            },
            is_transient,
        );
        assert_eq!(result, Err(Failure::Fatal));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn persistent_transient_failure_stops_after_max_wait() {
        let policy = RetryPolicy {
            max_wait: Some(Duration::from_millis(200)),
            interval: Duration::from_millis(20),
        };
        let started = Instant::now();
        let calls = Cell::new(0);
        let result: Result<(), Failure> = policy.run(
            || {
                calls.set(calls.get() + 1);
                Err(Failure::Transient)
            },
            is_transient,
        );
        let elapsed = started.elapsed();

        assert_eq!(result, Err(Failure::Transient));
        assert!(calls.get() > 1);
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    }
}

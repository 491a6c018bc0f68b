//! Fixed-delay retry for transport failures.

use super::provider::DataError;
use std::time::Duration;
use tracing::warn;

/// Fixed-count, fixed-delay retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(30),
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-transport error, or
/// `max_attempts` transport failures have occurred.
///
/// The closure receives the 1-based attempt number. Exhaustion is reported as
/// [`DataError::RetriesExhausted`] carrying the last transport error.
pub fn retry_fixed<T>(
    policy: &RetryPolicy,
    mut operation: impl FnMut(u32) -> Result<T, DataError>,
) -> Result<T, DataError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transport() => {
                warn!(attempt, max_attempts = attempts, error = %err, "transport failure");
                last_error = Some(err);
                if attempt < attempts {
                    std::thread::sleep(policy.delay);
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(DataError::RetriesExhausted {
        attempts,
        last: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn default_policy_is_five_attempts_thirty_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(30));
    }

    #[test]
    fn succeeds_immediately() {
        let mut calls = 0;
        let result = retry_fixed(&instant(), |_| {
            calls += 1;
            Ok::<_, DataError>(7)
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = retry_fixed(&instant(), |_| {
            calls += 1;
            Err(DataError::Transport("connection refused".into()))
        });
        assert_eq!(calls, 5);
        match result {
            Err(DataError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 5);
                assert!(last.contains("connection refused"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[test]
    fn status_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry_fixed(&instant(), |_| {
            calls += 1;
            Err(DataError::HttpStatus {
                status: 400,
                endpoint: "/futures/usdt/candlesticks".into(),
            })
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(DataError::HttpStatus { status: 400, .. })));
    }

    #[test]
    fn recovers_after_transient_failures() {
        let result = retry_fixed(&instant(), |attempt| {
            if attempt < 3 {
                Err(DataError::Transport("timed out".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::ZERO,
        };
        let mut calls = 0;
        let _ = retry_fixed(&policy, |_| {
            calls += 1;
            Err::<(), _>(DataError::Transport("reset".into()))
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn waits_the_delay_between_attempts() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_millis(20),
        };
        let started = std::time::Instant::now();
        let result: Result<(), _> =
            retry_fixed(&policy, |_| Err(DataError::Transport("reset".into())));

        assert!(matches!(result, Err(DataError::RetriesExhausted { attempts: 5, .. })));
        // Four gaps between five attempts.
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn no_wait_after_the_last_attempt() {
        // A single attempt never sleeps, however long the delay.
        let policy = RetryPolicy {
            max_attempts: 1,
            delay: Duration::from_secs(30),
        };
        let started = std::time::Instant::now();
        let result: Result<(), _> =
            retry_fixed(&policy, |_| Err(DataError::Transport("reset".into())));

        assert!(matches!(result, Err(DataError::RetriesExhausted { attempts: 1, .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn no_wait_after_success() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_secs(30),
        };
        let started = std::time::Instant::now();
        assert_eq!(retry_fixed(&policy, |_| Ok::<_, DataError>(1)).unwrap(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

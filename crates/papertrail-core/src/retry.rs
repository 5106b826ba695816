//! Retry with exponential backoff for single HTTP requests

use std::time::Duration;

use crate::http::{HttpError, http_config};

/// Base delay doubled per attempt
const BASE_DELAY: Duration = Duration::from_secs(2);

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub fn backoff_duration(attempt: u32) -> Duration {
    BASE_DELAY * 2u32.pow(attempt.saturating_sub(1).min(6))
}

/// Retry a fallible request with exponential backoff.
///
/// Retryable errors are logged and retried up to `max_retries` (from the
/// global [`HttpConfig`](crate::HttpConfig)). Returns the first success, or
/// the final error on exhaustion / non-retryable error.
pub fn retry_with_backoff<T>(
    label: &str,
    attempt_fn: impl FnMut() -> Result<T, HttpError>,
) -> Result<T, HttpError> {
    retry_with(label, http_config().max_retries, backoff_duration, attempt_fn)
}

fn retry_with<T>(
    label: &str,
    max_retries: u32,
    delay: impl Fn(u32) -> Duration,
    mut attempt_fn: impl FnMut() -> Result<T, HttpError>,
) -> Result<T, HttpError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                let wait = delay(attempt);
                log::warn!("{label}: {e}, retry {attempt}/{max_retries} in {wait:?}");
                std::thread::sleep(wait);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_exponential() {
        assert_eq!(backoff_duration(1), Duration::from_secs(2));
        assert_eq!(backoff_duration(2), Duration::from_secs(4));
        assert_eq!(backoff_duration(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_capped() {
        assert_eq!(backoff_duration(40), Duration::from_secs(128));
    }

    #[test]
    fn retries_transient_then_succeeds() {
        let mut calls = 0;
        let result = retry_with("test", 3, |_| Duration::ZERO, || {
            calls += 1;
            if calls < 3 {
                Err(HttpError::Http {
                    status: Some(503),
                    message: "unavailable".into(),
                })
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_on_non_retryable() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with("test", 3, |_| Duration::ZERO, || {
            calls += 1;
            Err(HttpError::Http {
                status: Some(404),
                message: "missing".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let mut calls = 0;
        let result: Result<(), _> = retry_with("test", 2, |_| Duration::ZERO, || {
            calls += 1;
            Err(HttpError::Http {
                status: Some(429),
                message: "slow down".into(),
            })
        });
        assert_eq!(result.unwrap_err().status(), Some(429));
        assert_eq!(calls, 3);
    }
}

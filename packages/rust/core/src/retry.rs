//! Bounded attempts with a fixed delay.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use migratebot_shared::{MigrateError, RetryConfig};

/// Errors that know whether another attempt might succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for MigrateError {
    fn is_retryable(&self) -> bool {
        MigrateError::is_retryable(self)
    }
}

/// Attempt limit and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl From<&RetryConfig> for AttemptPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            delay: config.delay(),
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. `op` receives the 1-based attempt number.
///
/// The last error is returned when every attempt fails.
pub async fn with_attempts<T, E, F, Fut>(policy: AttemptPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < max => {
                warn!(label, attempt, max, error = %e, "attempt failed, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(label, attempt, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn policy(max_attempts: u32) -> AttemptPolicy {
        AttemptPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let result = with_attempts(policy(3), "fetch", |attempt| {
            calls.set(calls.get() + 1);
            async move {
                if attempt < 3 {
                    Err(MigrateError::Fetch("timeout".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn exhausts_budget_and_returns_last_error() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_attempts(policy(3), "convert", |attempt| {
            calls.set(calls.get() + 1);
            async move {
                Err(MigrateError::ConversionQuality {
                    count: 4 + attempt as usize,
                    threshold: 4,
                })
            }
        })
        .await;
        assert!(matches!(
            result,
            Err(MigrateError::ConversionQuality { count: 7, .. })
        ));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_attempts(policy(3), "fetch", |_| {
            calls.set(calls.get() + 1);
            async { Err(MigrateError::extraction("no content")) }
        })
        .await;
        assert!(matches!(result, Err(MigrateError::Extraction { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let calls = Cell::new(0);
        let _: Result<(), MigrateError> = with_attempts(policy(0), "x", |_| {
            calls.set(calls.get() + 1);
            async { Err(MigrateError::Fetch("down".into())) }
        })
        .await;
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn policy_from_config() {
        let p = AttemptPolicy::from(&RetryConfig::default());
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.delay, Duration::from_millis(2000));
    }
}

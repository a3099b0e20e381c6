//! Exponential backoff retry, generalized from the submit-transaction retry
//! loop every chain adapter in this codebase used to hand-roll.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Used instead of `initial_delay` once a rate-limit response is seen.
    pub rate_limit_base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            rate_limit_base_delay: Duration::from_secs(2),
        }
    }
}

/// Whether a failure should be retried, and with which backoff floor.
pub enum Transient {
    Retry,
    RateLimited,
    Permanent,
}

/// Runs `op` up to `config.max_retries + 1` times with exponential backoff.
/// `classify` inspects an error and decides whether it's worth retrying; a
/// `Permanent` classification stops immediately.
pub async fn with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    op_name: &str,
    classify: impl Fn(&E) -> Transient,
    mut op: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    for attempt in 0..=config.max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let transient = classify(&err);
                if attempt == config.max_retries || matches!(transient, Transient::Permanent) {
                    return Err(err);
                }
                let wait = match transient {
                    Transient::RateLimited => delay.max(config.rate_limit_base_delay),
                    _ => delay,
                };
                warn!(
                    op = op_name,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    error = %err,
                    delay_ms = wait.as_millis() as u64,
                    "retrying after transient failure"
                );
                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(config.max_delay);
            }
        }
    }
    unreachable!("loop always returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = Cell::new(0);
        let config = RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            rate_limit_base_delay: Duration::from_millis(1),
        };
        let result: std::result::Result<u32, String> = with_backoff(
            &config,
            "test_op",
            |_: &String| Transient::Retry,
            || async {
                let n = attempts.get() + 1;
                attempts.set(n);
                if n < 3 {
                    Err("not yet".to_string())
                } else {
                    Ok(42)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn permanent_failure_stops_immediately() {
        let attempts = Cell::new(0);
        let config = RetryConfig::default();
        let result: std::result::Result<u32, String> = with_backoff(
            &config,
            "test_op",
            |_: &String| Transient::Permanent,
            || async {
                attempts.set(attempts.get() + 1);
                Err("nope".to_string())
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }
}

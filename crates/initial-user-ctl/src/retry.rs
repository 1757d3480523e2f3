//! Retrying of operations which fail because of concurrent modifications.

use std::{fmt::Display, time::Duration};

use rand::Rng as _;
use tracing::{error, warn};

/// Retry settings, exposed on the command line.
#[derive(Clone, Debug, PartialEq, Eq, clap::Args)]
#[command(next_help_heading = "Retry Options")]
pub struct RetryOptions {
    /// Maximum number of attempts per operation, 0 retries forever.
    #[arg(long, env, default_value_t = 5)]
    pub retry_max_attempts: u32,

    /// Delay before the first retry in milliseconds, doubled after every attempt.
    #[arg(long, env, default_value_t = 100)]
    pub retry_initial_delay_ms: u64,

    /// Upper bound of the delay between two attempts in milliseconds.
    #[arg(long, env, default_value_t = 10_000)]
    pub retry_max_delay_ms: u64,
}

impl From<&RetryOptions> for RetryConfig {
    fn from(options: &RetryOptions) -> Self {
        Self {
            max_attempts: options.retry_max_attempts,
            initial_delay: Duration::from_millis(options.retry_initial_delay_ms),
            max_delay: Duration::from_millis(options.retry_max_delay_ms),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// 0 means infinite.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delays between attempts before jitter, each one capped at `max_delay`.
    fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial_delay.min(self.max_delay)), |delay| {
            Some(delay.mul_f64(self.backoff_multiplier).min(self.max_delay))
        })
    }
}

/// Runs `operation` until it succeeds, fails with an error `should_retry` rejects, or the
/// attempts are exhausted. Delays grow exponentially and are jittered between 0.5x and 1.5x.
///
/// `operation` must read everything it depends on again, as a retry after a conflict is only
/// useful with fresh objects.
pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    should_retry: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0u32;
    let mut delays = config.delays();

    loop {
        attempt += 1;

        let error = match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };

        if !should_retry(&error) {
            return Err(error);
        }

        if config.max_attempts > 0 && attempt >= config.max_attempts {
            error!(
                operation = operation_name,
                attempt,
                %error,
                "operation failed after max retries"
            );
            return Err(error);
        }

        let delay = delays.next().unwrap_or(config.max_delay);
        let jitter = rand::rng().random_range(0.5..1.5);
        let jittered_delay = delay.mul_f64(jitter);
        warn!(
            operation = operation_name,
            attempt,
            %error,
            delay = ?jittered_delay,
            "operation failed, retrying"
        );

        tokio::time::sleep(jittered_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use rstest::rstest;

    use super::*;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    async fn fail_times(
        config: &RetryConfig,
        failures: u32,
        error: &'static str,
        count: &AtomicU32,
    ) -> Result<u32, &'static str> {
        retry_with_backoff(
            config,
            "op",
            |error: &&str| *error == "conflict",
            || async move {
                let attempt = count.fetch_add(1, Ordering::SeqCst);
                if attempt < failures {
                    Err(error)
                } else {
                    Ok(attempt)
                }
            },
        )
        .await
    }

    #[tokio::test]
    async fn succeeds_immediately() {
        let count = AtomicU32::new(0);

        assert_eq!(fail_times(&fast_config(3), 0, "conflict", &count).await, Ok(0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[case(3, 2, Ok(2), 3)]
    #[case(3, 5, Err("conflict"), 3)]
    #[case(0, 7, Ok(7), 8)]
    #[tokio::test]
    async fn retries_conflicts(
        #[case] max_attempts: u32,
        #[case] failures: u32,
        #[case] expected: Result<u32, &'static str>,
        #[case] attempts: u32,
    ) {
        let count = AtomicU32::new(0);

        let result = fail_times(&fast_config(max_attempts), failures, "conflict", &count).await;

        assert_eq!(result, expected);
        assert_eq!(count.load(Ordering::SeqCst), attempts);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let count = AtomicU32::new(0);

        let result = fail_times(&fast_config(5), 3, "forbidden", &count).await;

        assert_eq!(result, Err("forbidden"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    #[case(100, 1_000, &[100, 200, 400, 800, 1_000, 1_000])]
    #[case(250, 100, &[100, 100, 100])]
    #[case(100, 100, &[100, 100])]
    fn delays_grow_up_to_the_maximum(
        #[case] initial_delay_ms: u64,
        #[case] max_delay_ms: u64,
        #[case] expected_ms: &[u64],
    ) {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            ..RetryConfig::default()
        };

        let delays: Vec<_> = config.delays().take(expected_ms.len()).collect();
        let expected: Vec<_> = expected_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect();
        assert_eq!(delays, expected);
    }

    #[test]
    fn options_convert_to_config() {
        let config = RetryConfig::from(&RetryOptions {
            retry_max_attempts: 0,
            retry_initial_delay_ms: 250,
            retry_max_delay_ms: 2_000,
        });

        assert_eq!(config.max_attempts, 0);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(2));
    }
}

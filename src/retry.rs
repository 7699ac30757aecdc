//! Exponential-backoff retry driver (spec §4.3).

use std::time::Duration;

use tracing::{debug, warn};

/// Tuning knobs for [`retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryConfig {
    /// Delay before attempt `i` (0-indexed retry count), `min(initial * 2^i, max)`.
    #[must_use]
    pub fn delay_for_attempt(&self, i: u32) -> Duration {
        let scaled = self
            .initial_delay
            .checked_mul(1u32.checked_shl(i).unwrap_or(u32::MAX))
            .unwrap_or(self.max_delay);
        scaled.min(self.max_delay)
    }
}

/// Run `op`, retrying up to `config.max_attempts` times while
/// `should_retry(&error)` holds, sleeping `delay_for(&error, attempt)`
/// between attempts. Propagates the last error once attempts are exhausted
/// or `should_retry` returns false.
pub async fn retry<T, E, F, Fut>(
    config: &RetryConfig,
    should_retry: impl Fn(&E) -> bool,
    delay_for: impl Fn(&E, u32) -> Duration,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                let attempts_remaining = attempt < config.max_attempts;
                if !attempts_remaining || !should_retry(&err) {
                    warn!(attempt, "retry exhausted or non-retryable error");
                    return Err(err);
                }
                let delay = delay_for(&err, attempt - 1);
                debug!(attempt, ?delay, "retrying after error");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// [`retry`]'s `delay_for` argument for callers with no error-specific delay:
/// always falls back to `config.delay_for_attempt`.
pub fn exponential_delay<E>(config: &RetryConfig) -> impl Fn(&E, u32) -> Duration + '_ {
    move |_, i| config.delay_for_attempt(i)
}

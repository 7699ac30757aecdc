//! Per-platform rate limiter: a concurrency cap plus a refilling token
//! reservoir and a minimum gap between call starts (spec §4.2).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

use crate::platform::Platform;

/// Tuning for one platform's limiter.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub max_concurrent: usize,
    pub min_interval: Duration,
    pub reservoir_capacity: u32,
    pub refill_amount: u32,
    pub refill_interval: Duration,
}

impl RateLimiterConfig {
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Pm => Self {
                max_concurrent: 5,
                min_interval: Duration::from_millis(100),
                reservoir_capacity: 50,
                refill_amount: 50,
                refill_interval: Duration::from_secs(5),
            },
            Platform::Man => Self {
                max_concurrent: 3,
                min_interval: Duration::from_millis(200),
                reservoir_capacity: 25,
                refill_amount: 25,
                refill_interval: Duration::from_secs(5),
            },
            Platform::Kal => Self {
                max_concurrent: 2,
                min_interval: Duration::from_millis(500),
                reservoir_capacity: 10,
                refill_amount: 10,
                refill_interval: Duration::from_secs(5),
            },
        }
    }
}

struct LimiterState {
    tokens: u32,
    last_refill: Instant,
    last_start: Option<Instant>,
}

impl LimiterState {
    fn refill(&mut self, config: &RateLimiterConfig) {
        let elapsed = self.last_refill.elapsed();
        if elapsed < config.refill_interval {
            return;
        }
        let ticks = (elapsed.as_secs_f64() / config.refill_interval.as_secs_f64()).floor() as u32;
        if ticks == 0 {
            return;
        }
        self.tokens = (self.tokens + ticks * config.refill_amount).min(config.reservoir_capacity);
        self.last_refill += config.refill_interval * ticks;
    }

    fn time_until_next_token(&self, config: &RateLimiterConfig) -> Duration {
        config
            .refill_interval
            .saturating_sub(self.last_refill.elapsed())
    }
}

/// FIFO-fair limiter for one platform. Admission (token + min-interval +
/// concurrency slot) is serialized behind a single async mutex so waiters
/// are granted slots in the order they asked for one.
pub struct RateLimiter {
    platform: Platform,
    config: RateLimiterConfig,
    state: Mutex<LimiterState>,
    concurrency: Arc<Semaphore>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(platform: Platform, config: RateLimiterConfig) -> Self {
        Self {
            platform,
            concurrency: Arc::new(Semaphore::new(config.max_concurrent)),
            state: Mutex::new(LimiterState {
                tokens: config.reservoir_capacity,
                last_refill: Instant::now(),
                last_start: None,
            }),
            config,
        }
    }

    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        Self::new(platform, RateLimiterConfig::for_platform(platform))
    }

    /// Wait for a reservoir token, the min-interval gap since the last
    /// start, and a free concurrency slot, then run `op`.
    pub async fn schedule<T, F, Fut>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let permit = self.admit().await;
        let result = op().await;
        drop(permit);
        result
    }

    async fn admit(&self) -> tokio::sync::OwnedSemaphorePermit {
        let mut state = self.state.lock().await;
        debug!(platform = %self.platform, "rate_limiter.queued");

        state.refill(&self.config);
        if state.tokens == 0 {
            debug!(platform = %self.platform, "rate_limiter.depleted");
            let wait = state.time_until_next_token(&self.config);
            tokio::time::sleep(wait).await;
            state.refill(&self.config);
        }

        if let Some(last) = state.last_start {
            let elapsed = last.elapsed();
            if elapsed < self.config.min_interval {
                tokio::time::sleep(self.config.min_interval - elapsed).await;
            }
        }

        state.tokens = state.tokens.saturating_sub(1);
        state.last_start = Some(Instant::now());

        self.concurrency
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore never closed")
    }
}

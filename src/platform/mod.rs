//! Platform-agnostic market model and the adapter contract every
//! platform-specific module implements.

pub mod kalshi;
pub mod manifold;
pub mod polymarket;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PlatformError, Result};
use crate::ratelimit::RateLimiter;
use crate::retry::{retry, RetryConfig};

/// Closed set of platforms the scanner knows how to adapt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    Pm,
    Kal,
    Man,
}

impl Platform {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Pm => "PM",
            Platform::Kal => "KAL",
            Platform::Man => "MAN",
        }
    }

    /// Per-platform fee rate applied to the price paid on that platform.
    #[must_use]
    pub fn fee_rate(self) -> Decimal {
        use rust_decimal_macros::dec;
        match self {
            Platform::Pm => dec!(0.02),
            Platform::Kal => dec!(0.07),
            Platform::Man => dec!(0.00),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PM" => Ok(Platform::Pm),
            "KAL" => Ok(Platform::Kal),
            "MAN" => Ok(Platform::Man),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// One side of a binary market: a named outcome and its fixed-point price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub price: Decimal,
}

/// Normalized representation of a single binary prediction market, as
/// produced by every [`PlatformAdapter`].
///
/// Invariants (enforced by [`StandardMarket::new`]): exactly two outcomes,
/// each price in `[0, 1]`, `id` and `title` non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardMarket {
    pub id: String,
    pub platform: Platform,
    pub title: String,
    pub url: String,
    pub outcomes: [Outcome; 2],
    pub end_date: Option<DateTime<Utc>>,
    pub liquidity: Option<Decimal>,
    pub category: Option<String>,
}

impl StandardMarket {
    /// Construct a market, validating the §3 invariants. Adapters must
    /// route every market they produce through this constructor; a
    /// violation surfaces as [`PlatformError::ValidationFailure`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        platform: Platform,
        title: impl Into<String>,
        url: impl Into<String>,
        outcomes: [Outcome; 2],
        end_date: Option<DateTime<Utc>>,
        liquidity: Option<Decimal>,
        category: Option<String>,
    ) -> std::result::Result<Self, String> {
        let id = id.into();
        let title = title.into();
        if id.is_empty() {
            return Err("market id must not be empty".to_string());
        }
        if title.is_empty() {
            return Err("market title must not be empty".to_string());
        }
        for outcome in &outcomes {
            if outcome.price < Decimal::ZERO || outcome.price > Decimal::ONE {
                return Err(format!(
                    "outcome '{}' price {} out of [0,1]",
                    outcome.name, outcome.price
                ));
            }
        }
        Ok(Self {
            id,
            platform,
            title: title.to_string(),
            url: url.into(),
            outcomes,
            end_date,
            liquidity,
            category,
        })
    }
}

/// Capability set every platform adapter implements: fetch a page of
/// markets, or look one up by id.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch_markets(&self, limit: usize) -> Result<Vec<StandardMarket>>;

    /// Returns `Ok(None)` iff the platform answered 404 for this id.
    async fn fetch_market_by_id(&self, id: &str) -> Result<Option<StandardMarket>>;
}

/// Shared plumbing every concrete adapter wraps its HTTP calls in: a
/// rate-limiter slot, then the retry driver with `should_retry =
/// PlatformError::retryable`.
pub(crate) struct AdapterRuntime {
    pub http: reqwest::Client,
    pub rate_limiter: Arc<RateLimiter>,
    pub retry_config: RetryConfig,
}

impl AdapterRuntime {
    pub fn new(http: reqwest::Client, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            rate_limiter,
            retry_config: RetryConfig::default(),
        }
    }

    /// Run `op` under the rate limiter and the retry driver. `op` yields a
    /// [`PlatformError`] on failure; the retry driver's `should_retry`
    /// predicate is exactly [`PlatformError::retryable`], and the delay
    /// between attempts is the error's own [`PlatformError::suggested_delay`]
    /// (e.g. a parsed `Retry-After` header) when it carries one, falling
    /// back to the configured exponential backoff otherwise.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = std::result::Result<T, PlatformError>> + Send,
        T: Send,
    {
        let limiter = &self.rate_limiter;
        let result = retry(
            &self.retry_config,
            PlatformError::retryable,
            |err: &PlatformError, i| {
                let suggested = err.suggested_delay();
                if suggested > std::time::Duration::ZERO {
                    suggested
                } else {
                    self.retry_config.delay_for_attempt(i)
                }
            },
            || async { limiter.schedule(|| op()).await },
        )
        .await;
        result.map_err(Into::<crate::error::Error>::into)
    }
}

pub(crate) fn timeout_error(platform: Platform) -> PlatformError {
    PlatformError::NetworkTimeout {
        platform,
        cause: None,
    }
}

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

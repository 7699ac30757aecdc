//! Kalshi adapter.
//!
//! Kalshi quotes prices as integer cents; both are divided by 100 into
//! fixed-point decimals. Only `binary` markets with both ask sides present
//! are kept. `status` is accepted as any string (reference fixtures use
//! both `"open"` and other values in circulation; rejecting on this field
//! alone would drop legitimate markets).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::platform::{AdapterRuntime, Outcome, Platform, PlatformAdapter, StandardMarket};
use crate::ratelimit::RateLimiter;

#[derive(Debug, Deserialize)]
struct RawMarketList {
    markets: Vec<RawMarket>,
}

#[derive(Debug, Deserialize)]
struct RawMarket {
    ticker: String,
    title: String,
    #[serde(rename = "market_type")]
    market_type: String,
    #[allow(dead_code)]
    status: String,
    yes_ask: Option<i64>,
    no_ask: Option<i64>,
    close_time: Option<DateTime<Utc>>,
    liquidity: Option<i64>,
    category: Option<String>,
}

fn keep(raw: &RawMarket) -> bool {
    raw.market_type == "binary" && raw.yes_ask.is_some() && raw.no_ask.is_some()
}

fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn transform(raw: RawMarket) -> std::result::Result<StandardMarket, PlatformError> {
    let (yes_ask, no_ask) = match (raw.yes_ask, raw.no_ask) {
        (Some(y), Some(n)) => (y, n),
        _ => {
            return Err(PlatformError::ValidationFailure {
                platform: Platform::Kal,
                payload: "missing ask side on a market flagged as kept".to_string(),
            })
        }
    };

    StandardMarket::new(
        raw.ticker.clone(),
        Platform::Kal,
        raw.title,
        format!("https://kalshi.com/markets/{}", raw.ticker.to_lowercase()),
        [
            Outcome {
                name: "Yes".to_string(),
                price: cents_to_decimal(yes_ask),
            },
            Outcome {
                name: "No".to_string(),
                price: cents_to_decimal(no_ask),
            },
        ],
        raw.close_time,
        raw.liquidity.map(cents_to_decimal),
        raw.category,
    )
    .map_err(|payload| PlatformError::ValidationFailure {
        platform: Platform::Kal,
        payload,
    })
}

pub struct KalshiAdapter {
    runtime: AdapterRuntime,
    base_url: String,
}

impl KalshiAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            runtime: AdapterRuntime::new(http, Arc::new(RateLimiter::for_platform(Platform::Kal))),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PlatformAdapter for KalshiAdapter {
    fn platform(&self) -> Platform {
        Platform::Kal
    }

    async fn fetch_markets(&self, limit: usize) -> Result<Vec<StandardMarket>> {
        let url = format!("{}/markets?limit={limit}", self.base_url);
        let raw: RawMarketList = self
            .runtime
            .call(|| async {
                let resp = self
                    .runtime
                    .http
                    .get(&url)
                    .timeout(crate::platform::DEFAULT_TIMEOUT)
                    .send()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Kal, e))?;
                if !resp.status().is_success() {
                    return Err(PlatformError::classify_status(
                        Platform::Kal,
                        resp.status().as_u16(),
                        retry_after_seconds(&resp),
                    ));
                }
                resp.json::<RawMarketList>()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Kal, e))
            })
            .await?;

        let mut markets = Vec::new();
        for raw in raw.markets.into_iter().filter(keep) {
            markets.push(transform(raw)?);
        }
        Ok(markets)
    }

    async fn fetch_market_by_id(&self, id: &str) -> Result<Option<StandardMarket>> {
        let url = format!("{}/markets/{id}", self.base_url);
        let outcome = self
            .runtime
            .call(|| async {
                let resp = self
                    .runtime
                    .http
                    .get(&url)
                    .timeout(crate::platform::DEFAULT_TIMEOUT)
                    .send()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Kal, e))?;
                if resp.status().as_u16() == 404 {
                    return Ok(None);
                }
                if !resp.status().is_success() {
                    return Err(PlatformError::classify_status(
                        Platform::Kal,
                        resp.status().as_u16(),
                        retry_after_seconds(&resp),
                    ));
                }
                #[derive(Deserialize)]
                struct Envelope {
                    market: RawMarket,
                }
                let env: Envelope = resp
                    .json()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Kal, e))?;
                Ok(Some(env.market))
            })
            .await?;

        match outcome {
            Some(raw) if keep(&raw) => Ok(Some(transform(raw)?)),
            _ => Ok(None),
        }
    }
}

fn retry_after_seconds(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

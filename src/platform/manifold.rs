//! Manifold adapter.
//!
//! Manifold markets expose a single `probability` for the binary outcome;
//! the complementary `No` price is derived as `1 - probability`. Only
//! binary, unresolved markets are kept, so the adapter over-fetches (2x
//! the requested limit) before filtering and trimming back down.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::platform::{AdapterRuntime, Outcome, Platform, PlatformAdapter, StandardMarket};
use crate::ratelimit::RateLimiter;

#[derive(Debug, Deserialize)]
struct RawMarket {
    id: String,
    question: String,
    url: Option<String>,
    #[serde(rename = "outcomeType")]
    outcome_type: String,
    #[serde(rename = "isResolved")]
    is_resolved: bool,
    probability: Option<f64>,
    #[serde(rename = "closeTime")]
    close_time: Option<i64>,
    #[serde(rename = "totalLiquidity")]
    total_liquidity: Option<Decimal>,
    #[serde(rename = "groupSlugs")]
    group_slugs: Option<Vec<String>>,
}

fn keep(raw: &RawMarket) -> bool {
    raw.outcome_type == "BINARY" && !raw.is_resolved && raw.probability.is_some()
}

fn transform(raw: RawMarket) -> std::result::Result<StandardMarket, PlatformError> {
    let probability = raw.probability.ok_or_else(|| PlatformError::ValidationFailure {
        platform: Platform::Man,
        payload: "missing probability on a market flagged as kept".to_string(),
    })?;
    let yes_price = Decimal::from_f64_retain(probability).ok_or_else(|| {
        PlatformError::ValidationFailure {
            platform: Platform::Man,
            payload: format!("non-finite probability {probability}"),
        }
    })?;
    let no_price = Decimal::ONE - yes_price;

    let url = raw
        .url
        .clone()
        .unwrap_or_else(|| format!("https://manifold.markets/market/{}", raw.id));
    let end_date = raw
        .close_time
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    StandardMarket::new(
        raw.id,
        Platform::Man,
        raw.question,
        url,
        [
            Outcome {
                name: "Yes".to_string(),
                price: yes_price,
            },
            Outcome {
                name: "No".to_string(),
                price: no_price,
            },
        ],
        end_date,
        raw.total_liquidity,
        raw.group_slugs.and_then(|slugs| slugs.into_iter().next()),
    )
    .map_err(|payload| PlatformError::ValidationFailure {
        platform: Platform::Man,
        payload,
    })
}

pub struct ManifoldAdapter {
    runtime: AdapterRuntime,
    base_url: String,
}

impl ManifoldAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            runtime: AdapterRuntime::new(http, Arc::new(RateLimiter::for_platform(Platform::Man))),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PlatformAdapter for ManifoldAdapter {
    fn platform(&self) -> Platform {
        Platform::Man
    }

    async fn fetch_markets(&self, limit: usize) -> Result<Vec<StandardMarket>> {
        let over_fetch = limit.saturating_mul(2).max(1);
        let url = format!("{}/v0/markets?limit={over_fetch}", self.base_url);
        let raws: Vec<RawMarket> = self
            .runtime
            .call(|| async {
                let resp = self
                    .runtime
                    .http
                    .get(&url)
                    .timeout(crate::platform::DEFAULT_TIMEOUT)
                    .send()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Man, e))?;
                if !resp.status().is_success() {
                    return Err(PlatformError::classify_status(
                        Platform::Man,
                        resp.status().as_u16(),
                        retry_after_seconds(&resp),
                    ));
                }
                resp.json::<Vec<RawMarket>>()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Man, e))
            })
            .await?;

        let mut markets = Vec::with_capacity(limit);
        for raw in raws.into_iter().filter(keep) {
            if markets.len() >= limit {
                break;
            }
            markets.push(transform(raw)?);
        }
        Ok(markets)
    }

    async fn fetch_market_by_id(&self, id: &str) -> Result<Option<StandardMarket>> {
        let url = format!("{}/v0/market/{id}", self.base_url);
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
                    .map_err(|e| PlatformError::classify(Platform::Man, e))?;
                if resp.status().as_u16() == 404 {
                    return Ok(None);
                }
                if !resp.status().is_success() {
                    return Err(PlatformError::classify_status(
                        Platform::Man,
                        resp.status().as_u16(),
                        retry_after_seconds(&resp),
                    ));
                }
                let raw: RawMarket = resp
                    .json()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Man, e))?;
                Ok(Some(raw))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(outcome_type: &str, resolved: bool, probability: Option<f64>) -> RawMarket {
        RawMarket {
            id: "abc".into(),
            question: "Will X happen?".into(),
            url: None,
            outcome_type: outcome_type.into(),
            is_resolved: resolved,
            probability,
            close_time: None,
            total_liquidity: None,
            group_slugs: None,
        }
    }

    #[test]
    fn derives_complementary_no_price() {
        let market = transform(raw("BINARY", false, Some(0.6))).unwrap();
        assert_eq!(market.outcomes[0].name, "Yes");
        assert_eq!(market.outcomes[0].price.to_string(), "0.6");
        assert_eq!(market.outcomes[1].name, "No");
        assert_eq!(market.outcomes[1].price.to_string(), "0.4");
    }

    #[test]
    fn keep_rejects_non_binary() {
        assert!(!keep(&raw("FREE_RESPONSE", false, Some(0.5))));
    }

    #[test]
    fn keep_rejects_resolved() {
        assert!(!keep(&raw("BINARY", true, Some(0.5))));
    }

    #[test]
    fn keep_rejects_missing_probability() {
        assert!(!keep(&raw("BINARY", false, None)));
    }
}

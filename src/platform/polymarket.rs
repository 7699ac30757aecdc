//! Polymarket adapter.
//!
//! Polymarket's Gamma API returns `outcomes` and `outcomePrices` as
//! JSON-encoded string arrays rather than native JSON arrays, so the raw
//! DTO keeps them as `String` and [`parse_outcomes`] re-parses them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::{PlatformError, Result};
use crate::platform::{AdapterRuntime, Outcome, Platform, PlatformAdapter, StandardMarket};
use crate::ratelimit::RateLimiter;

#[derive(Debug, Deserialize)]
struct RawMarket {
    id: String,
    question: String,
    slug: Option<String>,
    #[serde(rename = "outcomes")]
    outcomes_json: String,
    #[serde(rename = "outcomePrices")]
    outcome_prices_json: String,
    #[serde(rename = "endDate")]
    end_date: Option<DateTime<Utc>>,
    liquidity: Option<Decimal>,
    category: Option<String>,
}

fn parse_outcomes(raw: &RawMarket, platform: Platform) -> std::result::Result<[Outcome; 2], PlatformError> {
    let names: Vec<String> = serde_json::from_str(&raw.outcomes_json).map_err(|_| {
        PlatformError::ValidationFailure {
            platform,
            payload: raw.outcomes_json.clone(),
        }
    })?;
    let prices: Vec<Decimal> = serde_json::from_str(&raw.outcome_prices_json).map_err(|_| {
        PlatformError::ValidationFailure {
            platform,
            payload: raw.outcome_prices_json.clone(),
        }
    })?;
    if names.len() != 2 || prices.len() != 2 {
        return Err(PlatformError::ValidationFailure {
            platform,
            payload: format!("{:?} / {:?}", names, prices),
        });
    }
    Ok([
        Outcome {
            name: names[0].clone(),
            price: prices[0],
        },
        Outcome {
            name: names[1].clone(),
            price: prices[1],
        },
    ])
}

fn transform(raw: RawMarket) -> std::result::Result<StandardMarket, PlatformError> {
    let outcomes = parse_outcomes(&raw, Platform::Pm)?;
    let url = match &raw.slug {
        Some(slug) => format!("https://polymarket.com/event/{slug}"),
        None => format!("https://polymarket.com/markets/{}", raw.id),
    };
    StandardMarket::new(
        raw.id.clone(),
        Platform::Pm,
        raw.question,
        url,
        outcomes,
        raw.end_date,
        raw.liquidity,
        raw.category,
    )
    .map_err(|payload| PlatformError::ValidationFailure {
        platform: Platform::Pm,
        payload,
    })
}

pub struct PolymarketAdapter {
    runtime: AdapterRuntime,
    base_url: String,
}

impl PolymarketAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            runtime: AdapterRuntime::new(http, Arc::new(RateLimiter::for_platform(Platform::Pm))),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PlatformAdapter for PolymarketAdapter {
    fn platform(&self) -> Platform {
        Platform::Pm
    }

    async fn fetch_markets(&self, limit: usize) -> Result<Vec<StandardMarket>> {
        let url = format!("{}/markets?limit={limit}&active=true&closed=false", self.base_url);
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
                    .map_err(|e| PlatformError::classify(Platform::Pm, e))?;
                if !resp.status().is_success() {
                    return Err(PlatformError::classify_status(
                        Platform::Pm,
                        resp.status().as_u16(),
                        retry_after_seconds(&resp),
                    ));
                }
                resp.json::<Vec<RawMarket>>()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Pm, e))
            })
            .await?;

        let mut markets = Vec::with_capacity(raws.len());
        for raw in raws {
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
                    .map_err(|e| PlatformError::classify(Platform::Pm, e))?;
                if resp.status().as_u16() == 404 {
                    return Ok(None);
                }
                if !resp.status().is_success() {
                    return Err(PlatformError::classify_status(
                        Platform::Pm,
                        resp.status().as_u16(),
                        retry_after_seconds(&resp),
                    ));
                }
                let raw: RawMarket = resp
                    .json()
                    .await
                    .map_err(|e| PlatformError::classify(Platform::Pm, e))?;
                Ok(Some(raw))
            })
            .await?;

        outcome.map(transform).transpose().map_err(Into::into)
    }
}

fn retry_after_seconds(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

//! Alert Dispatcher (spec §4.10): threshold filter, cooldown dedup via
//! Cache, Discord-embed webhook delivery, paced `sendMany`.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{alert_sent_key, Cache};
use crate::calculator::ArbitrageOpportunity;
use crate::error::Result;

/// Minimum spacing between consecutive webhook sends in [`AlertDispatcher::send_many`].
const SEND_SPACING: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    pub min_roi_percent: Decimal,
    pub min_profit_amount: Decimal,
    pub cooldown_seconds: u64,
}

/// Filters, deduplicates, and delivers arbitrage alerts. A missing webhook
/// URL silently disables dispatch (spec §7: `ConfigMissing` → warn once,
/// no error propagated).
pub struct AlertDispatcher<C: Cache> {
    http: reqwest::Client,
    cache: Arc<C>,
    config: AlertConfig,
}

impl<C: Cache> AlertDispatcher<C> {
    #[must_use]
    pub fn new(http: reqwest::Client, cache: Arc<C>, config: AlertConfig) -> Self {
        if config.webhook_url.is_none() {
            warn!("alert.no_webhook_configured");
        }
        Self { http, cache, config }
    }

    /// `roi >= min_roi_percent` AND `profit_margin >= min_profit_amount`.
    #[must_use]
    pub fn meets_threshold(&self, opp: &ArbitrageOpportunity) -> bool {
        opp.roi >= self.config.min_roi_percent && opp.profit_margin >= self.config.min_profit_amount
    }

    async fn already_sent(&self, opp: &ArbitrageOpportunity) -> bool {
        let key = alert_sent_key(&opp.market_a.id, &opp.market_b.id);
        self.cache.exists(&key).await.unwrap_or(false)
    }

    async fn mark_sent(&self, opp: &ArbitrageOpportunity) {
        let key = alert_sent_key(&opp.market_a.id, &opp.market_b.id);
        if let Err(err) = self.cache.set(&key, &true, self.config.cooldown_seconds).await {
            warn!(%err, "alert.cooldown_write_failed");
        }
    }

    fn embed(opp: &ArbitrageOpportunity) -> serde_json::Value {
        json!({
            "embeds": [{
                "title": "Arbitrage opportunity",
                "color": 0x2ecc71,
                "fields": [
                    { "name": opp.market_a.platform.as_str(), "value": format!("{} — buy {} @ {}", opp.market_a.title, opp.outcome_a.name, opp.outcome_a.price), "inline": false },
                    { "name": opp.market_b.platform.as_str(), "value": format!("{} — buy {} @ {}", opp.market_b.title, opp.outcome_b.name, opp.outcome_b.price), "inline": false },
                    { "name": "Net cost", "value": opp.net_cost.to_string(), "inline": true },
                    { "name": "Profit margin", "value": opp.profit_margin.to_string(), "inline": true },
                    { "name": "ROI", "value": format!("{}%", opp.roi), "inline": true },
                ],
                "timestamp": opp.timestamp.to_rfc3339(),
            }]
        })
    }

    /// Send one opportunity, skipping silently if no webhook is configured,
    /// the threshold isn't met, or it was already sent within the cooldown.
    /// Delivery failures are logged and never propagated (spec §7).
    pub async fn send(&self, opp: &ArbitrageOpportunity) {
        let Some(url) = self.config.webhook_url.as_ref() else {
            return;
        };
        if !self.meets_threshold(opp) {
            return;
        }
        if self.already_sent(opp).await {
            return;
        }

        match self.deliver(url, &Self::embed(opp)).await {
            Ok(()) => {
                info!(market_a = %opp.market_a.id, market_b = %opp.market_b.id, "alert.sent");
                self.mark_sent(opp).await;
            }
            Err(err) => warn!(%err, "alert.webhook_failed"),
        }
    }

    async fn deliver(&self, url: &str, body: &impl Serialize) -> Result<()> {
        let resp = self.http.post(url).json(body).send().await?;
        if !resp.status().is_success() {
            warn!(status = resp.status().as_u16(), "alert.webhook_non_2xx");
        }
        Ok(())
    }

    /// Send every opportunity sequentially, spaced at least
    /// [`SEND_SPACING`] apart, observing `cancel` between sends.
    pub async fn send_many(&self, opportunities: &[ArbitrageOpportunity], cancel: &CancellationToken) {
        for (i, opp) in opportunities.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            self.send(opp).await;
            if i + 1 < opportunities.len() {
                tokio::select! {
                    () = tokio::time::sleep(SEND_SPACING) => {}
                    () = cancel.cancelled() => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;
    use crate::matcher::MatchedBy;
    use crate::platform::{Outcome, Platform, StandardMarket};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn opportunity(roi: Decimal) -> ArbitrageOpportunity {
        let market = |id: &str, platform: Platform| {
            StandardMarket::new(
                id,
                platform,
                "title",
                "https://example.com",
                [
                    Outcome { name: "Yes".into(), price: dec!(0.4) },
                    Outcome { name: "No".into(), price: dec!(0.4) },
                ],
                None,
                None,
                None,
            )
            .unwrap()
        };
        ArbitrageOpportunity {
            market_a: market("a1", Platform::Pm),
            market_b: market("b1", Platform::Man),
            outcome_a: Outcome { name: "Yes".into(), price: dec!(0.4) },
            outcome_b: Outcome { name: "No".into(), price: dec!(0.4) },
            total_cost: dec!(0.8),
            fees_a: dec!(0.008),
            fees_b: dec!(0.0),
            total_fees: dec!(0.008),
            net_cost: dec!(0.808),
            profit_margin: dec!(0.192),
            roi,
            is_profitable: true,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn below_threshold_never_calls_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let dispatcher = AlertDispatcher::new(
            reqwest::Client::new(),
            Arc::new(MemoryCache::new()),
            AlertConfig {
                webhook_url: Some(server.uri()),
                min_roi_percent: dec!(50),
                min_profit_amount: dec!(0),
                cooldown_seconds: 60,
            },
        );
        dispatcher.send(&opportunity(dec!(10))).await;
    }

    #[tokio::test]
    async fn cooldown_suppresses_duplicate_sends() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let dispatcher = AlertDispatcher::new(
            reqwest::Client::new(),
            Arc::new(MemoryCache::new()),
            AlertConfig {
                webhook_url: Some(server.uri()),
                min_roi_percent: dec!(5),
                min_profit_amount: dec!(0),
                cooldown_seconds: 60,
            },
        );
        let opp = opportunity(dec!(20));
        dispatcher.send(&opp).await;
        dispatcher.send(&opp).await;
    }

    #[tokio::test]
    async fn no_webhook_configured_is_a_silent_noop() {
        let dispatcher = AlertDispatcher::new(
            reqwest::Client::new(),
            Arc::new(MemoryCache::new()),
            AlertConfig {
                webhook_url: None,
                min_roi_percent: dec!(5),
                min_profit_amount: dec!(0),
                cooldown_seconds: 60,
            },
        );
        dispatcher.send(&opportunity(dec!(99))).await;
    }

    #[tokio::test]
    async fn below_min_profit_amount_never_calls_webhook_even_if_roi_passes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let dispatcher = AlertDispatcher::new(
            reqwest::Client::new(),
            Arc::new(MemoryCache::new()),
            AlertConfig {
                webhook_url: Some(server.uri()),
                min_roi_percent: dec!(5),
                min_profit_amount: dec!(1),
                cooldown_seconds: 60,
            },
        );
        // roi of 20 clears min_roi_percent, but profit_margin (0.192) never clears
        // a min_profit_amount of 1.
        dispatcher.send(&opportunity(dec!(20))).await;
    }
}

//! Fee-aware arbitrage calculator (spec §4.6): evaluates both buy-direction
//! strategies for each matched binary pair in fixed-point decimal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::matcher::MarketMatch;
use crate::platform::{Outcome, StandardMarket};

/// One realized buy-direction opportunity (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub market_a: StandardMarket,
    pub market_b: StandardMarket,
    pub outcome_a: Outcome,
    pub outcome_b: Outcome,
    pub total_cost: Decimal,
    pub fees_a: Decimal,
    pub fees_b: Decimal,
    pub total_fees: Decimal,
    pub net_cost: Decimal,
    pub profit_margin: Decimal,
    pub roi: Decimal,
    pub is_profitable: bool,
    pub timestamp: DateTime<Utc>,
}

fn evaluate_strategy(
    m: &MarketMatch,
    outcome_a: &Outcome,
    outcome_b: &Outcome,
    now: DateTime<Utc>,
) -> Option<ArbitrageOpportunity> {
    let total_cost = outcome_a.price + outcome_b.price;
    if total_cost >= Decimal::ONE {
        return None;
    }

    let rate_a = m.market_a.platform.fee_rate();
    let rate_b = m.market_b.platform.fee_rate();
    let fees_a = outcome_a.price * rate_a;
    let fees_b = outcome_b.price * rate_b;
    let total_fees = fees_a + fees_b;

    let net_cost = total_cost + total_fees;
    let profit_margin = Decimal::ONE - net_cost;
    let is_profitable = profit_margin > Decimal::ZERO;
    let roi = if is_profitable {
        (profit_margin / net_cost) * Decimal::new(100, 0)
    } else {
        Decimal::ZERO
    };

    Some(ArbitrageOpportunity {
        market_a: m.market_a.clone(),
        market_b: m.market_b.clone(),
        outcome_a: outcome_a.clone(),
        outcome_b: outcome_b.clone(),
        total_cost,
        fees_a,
        fees_b,
        total_fees,
        net_cost,
        profit_margin,
        roi,
        is_profitable,
        timestamp: now,
    })
}

/// Evaluate both buy-direction strategies for every match, returning only
/// profitable opportunities.
#[must_use]
pub fn find_arbitrage(matches: &[MarketMatch], now: DateTime<Utc>) -> Vec<ArbitrageOpportunity> {
    let mut opportunities = Vec::new();
    for m in matches {
        let [a0, a1] = &m.market_a.outcomes;
        let [b0, b1] = &m.market_b.outcomes;

        for (outcome_a, outcome_b) in [(a0, b1), (a1, b0)] {
            if let Some(opp) = evaluate_strategy(m, outcome_a, outcome_b, now) {
                if opp.is_profitable {
                    opportunities.push(opp);
                }
            }
        }
    }
    opportunities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchedBy;
    use crate::platform::Platform;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn market(platform: Platform, id: &str, yes: Decimal, no: Decimal) -> StandardMarket {
        StandardMarket::new(
            id,
            platform,
            "title",
            "https://example.com",
            [
                Outcome {
                    name: "Yes".into(),
                    price: yes,
                },
                Outcome {
                    name: "No".into(),
                    price: no,
                },
            ],
            None,
            None,
            None,
        )
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn seed_scenario_1_clear_arb_pm_man() {
        let m = MarketMatch {
            market_a: market(Platform::Pm, "pm", dec!(0.45), dec!(0.55)),
            market_b: market(Platform::Man, "man", dec!(0.60), dec!(0.38)),
            score: 90,
            matched_by: MatchedBy::Fuzzy,
        };
        let opps = find_arbitrage(&[m], now());
        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.outcome_a.name, "Yes");
        assert_eq!(opp.outcome_b.name, "No");
        assert_eq!(opp.total_cost, dec!(0.83));
        assert_eq!(opp.total_fees, dec!(0.0090));
        assert_eq!(opp.net_cost, dec!(0.8390));
        assert_eq!(opp.profit_margin, dec!(0.1610));
        assert!(opp.is_profitable);
        // roi ~= 19.19%
        assert!((opp.roi - dec!(19.19)).abs() < dec!(0.01));
    }

    #[test]
    fn seed_scenario_2_fees_erase_gap_pm_kal() {
        let m = MarketMatch {
            market_a: market(Platform::Pm, "pm", dec!(0.50), dec!(0.49)),
            market_b: market(Platform::Kal, "kal", dec!(0.51), dec!(0.48)),
            score: 90,
            matched_by: MatchedBy::Fuzzy,
        };
        assert!(find_arbitrage(&[m], now()).is_empty());
    }

    #[test]
    fn seed_scenario_3_high_roi_pm_man() {
        let m = MarketMatch {
            market_a: market(Platform::Pm, "pm", dec!(0.35), dec!(0.65)),
            market_b: market(Platform::Man, "man", dec!(0.70), dec!(0.28)),
            score: 90,
            matched_by: MatchedBy::Fuzzy,
        };
        let opps = find_arbitrage(&[m], now());
        let best = opps
            .iter()
            .find(|o| o.outcome_a.name == "Yes" && o.outcome_b.name == "No")
            .unwrap();
        assert_eq!(best.total_cost, dec!(0.63));
        assert!((best.profit_margin - dec!(0.363)).abs() < dec!(0.001));
        assert!((best.roi - dec!(56.98)).abs() < dec!(0.01));
    }

    #[test]
    fn total_cost_exactly_one_emits_nothing() {
        let m = MarketMatch {
            market_a: market(Platform::Man, "man", dec!(0.50), dec!(0.50)),
            market_b: market(Platform::Pm, "pm", dec!(0.50), dec!(0.50)),
            score: 90,
            matched_by: MatchedBy::Fuzzy,
        };
        assert!(find_arbitrage(&[m], now()).is_empty());
    }

    #[test]
    fn is_profitable_iff_profit_margin_positive() {
        let m = MarketMatch {
            market_a: market(Platform::Pm, "pm", dec!(0.10), dec!(0.10)),
            market_b: market(Platform::Man, "man", dec!(0.10), dec!(0.10)),
            score: 90,
            matched_by: MatchedBy::Fuzzy,
        };
        for opp in find_arbitrage(&[m], now()) {
            assert_eq!(opp.is_profitable, opp.profit_margin > Decimal::ZERO);
            assert!(opp.net_cost > Decimal::ZERO);
        }
    }
}

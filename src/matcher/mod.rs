//! Cross-platform market matcher (spec §4.5): a cheap pre-filter followed
//! by a fuzzy best-match ranker, at most one match per element of `a`.

mod fuzzy;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::platform::StandardMarket;

const MAX_DATE_DIFF_DAYS: i64 = 30;
const MIN_MATCH_CHAR_LENGTH: usize = 3;
const MAX_DISTANCE: f64 = 0.40;
const MIN_SCORE: u8 = 60;

const STOP_WORDS: &[&str] = &[
    "will", "the", "be", "in", "on", "at", "to", "a", "an", "is", "are", "was", "were", "for",
    "of", "by", "or",
];

/// How a [`MarketMatch`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedBy {
    Exact,
    Fuzzy,
    Manual,
}

/// A candidate cross-platform pair (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMatch {
    pub market_a: StandardMarket,
    pub market_b: StandardMarket,
    pub score: u8,
    pub matched_by: MatchedBy,
}

/// Lowercased tokens of length > 2, punctuation normalized to whitespace,
/// with the small English stop-word set removed.
fn keywords(title: &str) -> HashSet<String> {
    let normalized = fuzzy::normalize(title);
    normalized
        .split_whitespace()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn passes_prefilter(a: &StandardMarket, b: &StandardMarket) -> bool {
    if a.outcomes.len() != b.outcomes.len() {
        return false;
    }
    if let (Some(end_a), Some(end_b)) = (a.end_date, b.end_date) {
        let diff = (end_a - end_b).num_days().abs();
        if diff > MAX_DATE_DIFF_DAYS {
            return false;
        }
    }
    let kw_a = keywords(&a.title);
    let kw_b = keywords(&b.title);
    !kw_a.is_disjoint(&kw_b) && !kw_a.is_empty() && !kw_b.is_empty()
}

/// Find each `a`'s best counterpart in `b`, if any candidate survives the
/// pre-filter and the fuzzy ranker's threshold.
#[must_use]
pub fn find_matches(a: &[StandardMarket], b: &[StandardMarket]) -> Vec<MarketMatch> {
    let mut matches = Vec::new();
    for market_a in a {
        let candidates: Vec<&StandardMarket> = b
            .iter()
            .filter(|market_b| market_a.platform != market_b.platform)
            .filter(|market_b| passes_prefilter(market_a, market_b))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let titles = candidates.iter().enumerate().map(|(i, m)| (i, m.title.as_str()));
        let ranked = fuzzy::rank(&market_a.title, titles, MIN_MATCH_CHAR_LENGTH, MAX_DISTANCE);
        let Some((best_idx, best_distance)) = ranked.into_iter().next() else {
            continue;
        };

        let score = ((1.0 - best_distance) * 100.0).round() as i64;
        let score = score.clamp(0, 100) as u8;
        if score < MIN_SCORE {
            continue;
        }

        matches.push(MarketMatch {
            market_a: market_a.clone(),
            market_b: candidates[best_idx].clone(),
            score,
            matched_by: MatchedBy::Fuzzy,
        });
    }
    matches
}

//! Location-independent fuzzy string ranker.
//!
//! Scores two strings by greedily finding all common runs of at least
//! `min_match_len` characters (longest run first, then recursing on the
//! unmatched left/right slices), then normalizing the matched character
//! count into a Dice-coefficient-style distance in `[0, 1]`. This mirrors
//! Fuse.js's `ignoreLocation` + `findAllMatches` + `minMatchCharLength`
//! semantics referenced by the matcher: matches are found anywhere in the
//! string (not anchored near a `location`), and every run counts, not just
//! the longest one.

/// Normalize for comparison: lowercase, punctuation to whitespace, collapse
/// runs of whitespace.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

/// Total number of characters covered by non-overlapping common runs of at
/// least `min_len` characters between `a` and `b`.
fn matched_chars(a: &[char], b: &[char], min_len: usize) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (run_len, a_start, b_start) = longest_common_run(a, b);
    if run_len < min_len {
        return 0;
    }
    let left = matched_chars(&a[..a_start], &b[..b_start], min_len);
    let right = matched_chars(&a[a_start + run_len..], &b[b_start + run_len..], min_len);
    run_len + left + right
}

/// Classic O(|a|*|b|) longest-common-substring DP. Returns (length, a_start, b_start).
fn longest_common_run(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = (0usize, 0usize, 0usize);
    for i in 0..a.len() {
        let mut curr = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let len = prev[j] + 1;
                curr[j + 1] = len;
                if len > best.0 {
                    best = (len, i + 1 - len, j + 1 - len);
                }
            }
        }
        prev = curr;
    }
    best
}

/// Normalized distance in `[0, 1]`: 0 for identical strings, 1 for no
/// shared run of at least `min_match_len` characters.
#[must_use]
pub fn distance(a: &str, b: &str, min_match_len: usize) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    let ca: Vec<char> = na.chars().collect();
    let cb: Vec<char> = nb.chars().collect();
    if ca.is_empty() && cb.is_empty() {
        return 0.0;
    }
    let matched = matched_chars(&ca, &cb, min_match_len);
    let total = ca.len() + cb.len();
    if total == 0 {
        return 0.0;
    }
    1.0 - (2.0 * matched as f64) / (total as f64)
}

/// Rank `candidates` by distance to `query`, ascending, stable on ties
/// (first-seen order wins). Only candidates at or under
/// `max_distance` are returned.
#[must_use]
pub fn rank<'a>(
    query: &str,
    candidates: impl Iterator<Item = (usize, &'a str)>,
    min_match_len: usize,
    max_distance: f64,
) -> Vec<(usize, f64)> {
    let mut scored: Vec<(usize, f64)> = candidates
        .map(|(idx, title)| (idx, distance(query, title, min_match_len)))
        .filter(|(_, d)| *d <= max_distance)
        .collect();
    scored.sort_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

//! Relevance scoring for entity search.
//!
//! Scores are tiered and case-insensitive:
//!
//! | Match | Score |
//! |-------|-------|
//! | id equals query | `1.0` |
//! | id starts with query | `0.8` |
//! | id contains query | `0.5` |
//! | otherwise | `0.5 × (1 − d / max(len(id), len(query)))`, `d` = Levenshtein distance |
//!
//! The fuzzy tier never reaches `0.5`: a distance of zero would already be an
//! exact match. Candidates scoring below [`INCLUSION_THRESHOLD`] are dropped
//! by the catalog.

pub const EXACT_SCORE: f64 = 1.0;
pub const PREFIX_SCORE: f64 = 0.8;
pub const SUBSTRING_SCORE: f64 = 0.5;

/// Minimum score for a candidate to appear in search results.
pub const INCLUSION_THRESHOLD: f64 = 0.3;

/// Relevance of `candidate` (an entity id) for `query`, in `[0.0, 1.0]`.
pub fn relevance_score(candidate: &str, query: &str) -> f64 {
    let candidate = candidate.to_lowercase();
    let query = query.to_lowercase();

    if candidate == query {
        EXACT_SCORE
    } else if candidate.starts_with(&query) {
        PREFIX_SCORE
    } else if candidate.contains(&query) {
        SUBSTRING_SCORE
    } else {
        SUBSTRING_SCORE * similarity(&candidate, &query)
    }
}

/// Whether a score clears the inclusion threshold.
pub fn is_relevant(score: f64) -> bool {
    score >= INCLUSION_THRESHOLD
}

/// Normalized edit similarity in `[0.0, 1.0]`; `1.0` only for equal strings.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

/// Two-row Levenshtein distance over chars.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

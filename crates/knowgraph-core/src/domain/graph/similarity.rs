//! Lexical string similarity
//!
//! Labels and aliases coming out of the generation service vary in case,
//! spacing, and punctuation ("Berlin Wall" vs "berlin-wall"). Scores here are
//! the Jaccard coefficient over character bigrams of a normalized form, so
//! those differences vanish while genuinely different names stay apart.

use std::collections::HashSet;

/// Normalize a string for comparison
///
/// Lowercases and keeps only ASCII letters and digits.
pub fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Bigram similarity between two strings, in `[0.0, 1.0]`
///
/// Symmetric and deterministic. Identical inputs always score `1.0`; inputs
/// that normalize to the same non-empty string also score `1.0`. Anything
/// that normalizes to fewer than two characters (and is not identical)
/// scores `0.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let a = normalize(a);
    let b = normalize(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let a_bigrams = bigrams(&a);
    let b_bigrams = bigrams(&b);

    if a_bigrams.is_empty() || b_bigrams.is_empty() {
        return 0.0;
    }

    let intersection = a_bigrams.intersection(&b_bigrams).count();
    let union = a_bigrams.union(&b_bigrams).count();

    intersection as f64 / union as f64
}

/// All contiguous two-byte windows of an ASCII string
fn bigrams(s: &str) -> HashSet<&[u8]> {
    s.as_bytes().windows(2).collect()
}

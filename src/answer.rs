//! Answer normalization and match decisions
//!
//! This module decides whether a submitted response matches a canonical
//! answer. It is pure and stateless: it knows nothing about scores,
//! phases, or players. Normalization strips the response phrasing
//! players habitually type ("what is ...", "who are ...") along with
//! articles and punctuation, then the decision falls through three
//! tiers: normalized equality, whole-string similarity, and partial
//! (substring) similarity against a stricter threshold.

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants::matching::{DEFAULT_FULL_THRESHOLD, DEFAULT_PARTIAL_THRESHOLD};

/// Leading phrasings stripped from responses before comparison.
///
/// Order matters: question phrasings come before articles so that
/// "what is the mississippi" reduces all the way to "mississippi".
/// Each prefix is stripped at most once.
const RESPONSE_PREFIXES: [&str; 11] = [
    "what is ",
    "who is ",
    "what are ",
    "who are ",
    "what's ",
    "whats ",
    "who's ",
    "whos ",
    "the ",
    "a ",
    "an ",
];

/// Punctuation removed from responses before comparison
const PUNCTUATION: [char; 6] = ['.', '?', '!', ',', ';', ':'];

/// Tunable strictness of the match decision
///
/// Both thresholds are similarity ratios in `[0, 1]`. The partial
/// threshold should sit above the full threshold: matching a fragment
/// of the canonical answer demands more confidence than matching the
/// whole string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct MatchOptions {
    /// Minimum similarity for a whole-string match
    #[garde(range(min = 0.0, max = 1.0))]
    pub full_threshold: f64,
    /// Minimum similarity for a partial (windowed) match
    #[garde(range(min = 0.0, max = 1.0))]
    pub partial_threshold: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            full_threshold: DEFAULT_FULL_THRESHOLD,
            partial_threshold: DEFAULT_PARTIAL_THRESHOLD,
        }
    }
}

/// Normalizes a response for comparison
///
/// Case-folds, trims, strips response phrasing and leading articles,
/// removes punctuation, and collapses internal whitespace.
pub fn normalize(answer: &str) -> String {
    let mut result = answer.trim().to_lowercase();
    for prefix in RESPONSE_PREFIXES {
        if let Some(rest) = result.strip_prefix(prefix) {
            result = rest.trim_start().to_owned();
        }
    }
    result
        .replace(PUNCTUATION, "")
        .split_whitespace()
        .join(" ")
}

/// Similarity of two normalized strings in `[0, 1]`
fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Best similarity of the shorter string against any same-length
/// window of the longer one. This is what lets "mississippi" match
/// "the mississippi river" once the articles are gone.
fn partial_similarity(a: &str, b: &str) -> f64 {
    let (shorter, longer) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    if shorter.is_empty() {
        return 0.0;
    }

    let longer_chars: Vec<char> = longer.chars().collect();
    let window = shorter.chars().count();

    longer_chars
        .windows(window)
        .map(|w| similarity(shorter, &w.iter().collect::<String>()))
        .fold(0.0, f64::max)
}

/// Decides whether a submitted response matches the canonical answer
///
/// Accepts on normalized equality, whole-string similarity at or above
/// `options.full_threshold`, or partial similarity strictly above the
/// stricter `options.partial_threshold`. The partial tier is strict
/// because a fragment can tie a same-length window exactly; at a
/// threshold of 1.0 only the equality tier accepts.
pub fn matches(submitted: &str, canonical: &str, options: &MatchOptions) -> bool {
    let submitted = normalize(submitted);
    let canonical = normalize(canonical);

    if submitted.is_empty() || canonical.is_empty() {
        return submitted == canonical;
    }
    if submitted == canonical {
        return true;
    }
    if similarity(&submitted, &canonical) >= options.full_threshold {
        return true;
    }
    partial_similarity(&submitted, &canonical) > options.partial_threshold
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(normalize("  MARS  "), "mars");
    }

    #[test]
    fn test_normalize_strips_what_is() {
        assert_eq!(normalize("What is Mars?"), "mars");
    }

    #[test]
    fn test_normalize_strips_who_is() {
        assert_eq!(normalize("WHO IS Einstein"), "einstein");
    }

    #[test]
    fn test_normalize_strips_what_are() {
        assert_eq!(normalize("what are tectonic plates"), "tectonic plates");
    }

    #[test]
    fn test_normalize_strips_article_after_phrasing() {
        assert_eq!(normalize("What is the Mississippi?"), "mississippi");
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize("Einstein!?"), "einstein");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("george   washington"), "george washington");
    }

    #[test]
    fn test_matches_exact() {
        let options = MatchOptions::default();
        assert!(matches("Mars", "Mars", &options));
    }

    #[test]
    fn test_matches_case_insensitive() {
        let options = MatchOptions::default();
        assert!(matches("mars", "Mars", &options));
    }

    #[test]
    fn test_matches_with_phrasing() {
        let options = MatchOptions::default();
        assert!(matches("What is Mars?", "Mars", &options));
        assert!(matches("who is Einstein", "Einstein", &options));
    }

    #[test]
    fn test_matches_near_miss_spelling() {
        let options = MatchOptions::default();
        assert!(matches("Shakespear", "Shakespeare", &options));
    }

    #[test]
    fn test_matches_rejects_wrong_answer() {
        let options = MatchOptions::default();
        assert!(!matches("Jupiter", "Mars", &options));
    }

    #[test]
    fn test_matches_rejects_empty_submission() {
        let options = MatchOptions::default();
        assert!(!matches("", "Mars", &options));
        assert!(!matches("   ", "Mars", &options));
    }

    #[test]
    fn test_partial_match_fragment() {
        let options = MatchOptions::default();
        assert!(matches(
            "Mississippi",
            "the Mississippi River",
            &options
        ));
    }

    #[test]
    fn test_thresholds_are_tunable() {
        // With a maximally strict configuration, only equality passes.
        let strict = MatchOptions {
            full_threshold: 1.0,
            partial_threshold: 1.0,
        };
        assert!(!matches("Shakespear", "Shakespeare", &strict));
        assert!(matches("Shakespeare", "Shakespeare", &strict));
    }

    #[test]
    fn test_match_options_validation() {
        use garde::Validate;

        let valid = MatchOptions::default();
        assert!(valid.validate().is_ok());

        let invalid = MatchOptions {
            full_threshold: 1.5,
            partial_threshold: 0.9,
        };
        assert!(invalid.validate().is_err());
    }
}

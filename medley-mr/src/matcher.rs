//! Fuzzy string matching for candidate ranking
//!
//! Every adapter ranks upstream search results with these primitives. The
//! weights and thresholds here are behaviorally load-bearing: scoring is a
//! frozen contract verified by the unit tests, not a tuning surface.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Default threshold for [`is_fuzzy_match`]
pub const FUZZY_THRESHOLD: f64 = 0.8;

/// Candidate points for an exact normalized-title match
pub const CANDIDATE_EXACT_TITLE: f64 = 100.0;
/// Candidate points when one normalized title contains the other
pub const CANDIDATE_PARTIAL_TITLE: f64 = 50.0;
/// Minimum candidate score an adapter accepts; below this the adapter
/// reports "no match" rather than a low-confidence guess
pub const CANDIDATE_FLOOR: f64 = 50.0;

/// Normalize a string for comparison: lowercase, strip punctuation
/// (retaining word characters and whitespace), collapse internal
/// whitespace, trim. Pure and idempotent.
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classic Levenshtein edit distance (insert/delete/substitute cost 1)
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Similarity in `[0, 1]` over normalized strings.
///
/// `1 - distance / max(len)`; equal normalized strings score 1, either
/// side empty after normalization scores 0.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);

    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    if na == nb {
        return 1.0;
    }

    let distance = levenshtein_distance(&na, &nb);
    let max_len = na.chars().count().max(nb.chars().count());
    1.0 - (distance as f64 / max_len as f64)
}

/// Boolean gate on [`string_similarity`]
pub fn is_fuzzy_match(a: &str, b: &str, threshold: f64) -> bool {
    string_similarity(a, b) >= threshold
}

/// Jaccard index over character n-gram sets of the normalized strings.
///
/// Falls back to [`string_similarity`] when either normalized string is
/// shorter than `n`.
pub fn ngram_similarity(a: &str, b: &str, n: usize) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);

    let chars_a: Vec<char> = na.chars().collect();
    let chars_b: Vec<char> = nb.chars().collect();

    if chars_a.len() < n || chars_b.len() < n {
        return string_similarity(a, b);
    }

    let grams_a: HashSet<&[char]> = chars_a.windows(n).collect();
    let grams_b: HashSet<&[char]> = chars_b.windows(n).collect();

    let intersection = grams_a.intersection(&grams_b).count();
    let union = grams_a.union(&grams_b).count();

    intersection as f64 / union as f64
}

/// Composite title/author match score in `[0, 1]`.
///
/// Title similarity weighted 0.6 plus a 0.15 containment bonus. When both
/// authors are present: author similarity weighted 0.3 plus a 0.1 bonus
/// for partial token overlap. When exactly one side has an author, the
/// total is multiplied by 0.9 (asymmetric evidence penalty).
pub fn book_match_score(
    query_title: &str,
    query_author: Option<&str>,
    result_title: &str,
    result_author: Option<&str>,
) -> f64 {
    let mut score = string_similarity(query_title, result_title) * 0.6;

    let nqt = normalize(query_title);
    let nrt = normalize(result_title);
    if !nqt.is_empty() && !nrt.is_empty() && (nqt.contains(&nrt) || nrt.contains(&nqt)) {
        score += 0.15;
    }

    match (query_author, result_author) {
        (Some(qa), Some(ra)) => {
            score += string_similarity(qa, ra) * 0.3;
            if author_tokens_overlap(qa, ra) {
                score += 0.1;
            }
        }
        (None, None) => {}
        _ => score *= 0.9,
    }

    score.min(1.0)
}

/// Partial token overlap: any token pair (length > 2) where one normalized
/// token contains the other
fn author_tokens_overlap(a: &str, b: &str) -> bool {
    let na = normalize(a);
    let nb = normalize(b);
    for ta in na.split_whitespace().filter(|t| t.len() > 2) {
        for tb in nb.split_whitespace().filter(|t| t.len() > 2) {
            if ta.contains(tb) || tb.contains(ta) {
                return true;
            }
        }
    }
    false
}

/// Result of [`extract_series_from_title`]
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesExtraction {
    pub clean_title: String,
    pub series_name: Option<String>,
    pub series_position: Option<f32>,
}

// "Title (Series #N)" / "Title (Series, Book N)"
static SERIES_PAREN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s*\((.+?)[,\s]*(?:\bBook|\bNo\.?|\bVol(?:ume)?\.?|#)\s*(\d+(?:\.\d+)?)\)$")
        .expect("series paren pattern")
});

// "Title: Series #N" / "Title: Series Book N"
static SERIES_COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?):\s*(.+?)\s*(?:\bBook\b|#)\s*(\d+(?:\.\d+)?)$")
        .expect("series colon pattern")
});

// "Title, Book N" (series name is the title itself)
static SERIES_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?),\s*(?:Book|No\.?|Vol(?:ume)?\.?)\s*(\d+(?:\.\d+)?)$")
        .expect("series comma pattern")
});

/// Pattern-match common series conventions embedded in a title.
///
/// Patterns are tried in order; first match wins. No match returns the
/// original title with both series fields `None`.
pub fn extract_series_from_title(title: &str) -> SeriesExtraction {
    let trimmed = title.trim();

    if let Some(caps) = SERIES_PAREN.captures(trimmed) {
        return SeriesExtraction {
            clean_title: caps[1].trim().to_string(),
            series_name: Some(caps[2].trim().trim_end_matches(',').to_string()),
            series_position: caps[3].parse().ok(),
        };
    }

    if let Some(caps) = SERIES_COLON.captures(trimmed) {
        return SeriesExtraction {
            clean_title: caps[1].trim().to_string(),
            series_name: Some(caps[2].trim().to_string()),
            series_position: caps[3].parse().ok(),
        };
    }

    if let Some(caps) = SERIES_COMMA.captures(trimmed) {
        let clean_title = caps[1].trim().to_string();
        return SeriesExtraction {
            series_name: Some(clean_title.clone()),
            clean_title,
            series_position: caps[2].parse().ok(),
        };
    }

    SeriesExtraction {
        clean_title: title.to_string(),
        series_name: None,
        series_position: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize("  The Name   of the Wind! "), "the name of the wind");
        assert_eq!(normalize("Don't Panic"), "dont panic");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in ["  Mixed CASE, with; punct!  ", "plain", "", "a  b\tc"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn levenshtein_kitten_sitting_is_three() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn similarity_of_identical_strings_is_one() {
        assert_eq!(string_similarity("The Hobbit", "The Hobbit"), 1.0);
        assert_eq!(string_similarity("The Hobbit", "the hobbit!"), 1.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let ab = string_similarity("The Name of the Wind", "The Wise Man's Fear");
        let ba = string_similarity("The Wise Man's Fear", "The Name of the Wind");
        assert_eq!(ab, ba);
    }

    #[test]
    fn similarity_of_empty_is_zero() {
        assert_eq!(string_similarity("", "anything"), 0.0);
        assert_eq!(string_similarity("!!!", "anything"), 0.0);
    }

    #[test]
    fn fuzzy_match_gates_on_threshold() {
        assert!(is_fuzzy_match("The Hobbit", "The Hobbit", FUZZY_THRESHOLD));
        assert!(!is_fuzzy_match("The Hobbit", "War and Peace", FUZZY_THRESHOLD));
    }

    #[test]
    fn ngram_similarity_of_identical_is_one() {
        assert_eq!(ngram_similarity("wind", "Wind!", 2), 1.0);
    }

    #[test]
    fn ngram_similarity_falls_back_when_too_short() {
        // "a" is shorter than the bigram size, so the levenshtein path runs
        assert_eq!(ngram_similarity("a", "a", 2), 1.0);
    }

    #[test]
    fn book_score_identical_title_and_author_is_high() {
        let score = book_match_score(
            "The Name of the Wind",
            Some("Patrick Rothfuss"),
            "The Name of the Wind",
            Some("Patrick Rothfuss"),
        );
        // 0.6 + 0.15 + 0.3 + 0.1 clamped to 1.0
        assert!(score > 0.9);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn book_score_unrelated_title_is_low() {
        let score = book_match_score("The Name of the Wind", None, "Pride and Prejudice", None);
        assert!(score < 0.3);
    }

    #[test]
    fn book_score_penalizes_asymmetric_author_evidence() {
        let with_both = book_match_score("Dune", Some("Frank Herbert"), "Dune", Some("Frank Herbert"));
        let one_sided = book_match_score("Dune", Some("Frank Herbert"), "Dune", None);
        assert!(one_sided < with_both);
        // (0.6 + 0.15) * 0.9
        assert!((one_sided - 0.675).abs() < 1e-9);
    }

    #[test]
    fn extracts_parenthesized_series() {
        let extracted =
            extract_series_from_title("The Name of the Wind (The Kingkiller Chronicle #1)");
        assert_eq!(extracted.clean_title, "The Name of the Wind");
        assert_eq!(extracted.series_name.as_deref(), Some("The Kingkiller Chronicle"));
        assert_eq!(extracted.series_position, Some(1.0));
    }

    #[test]
    fn extracts_parenthesized_series_with_book_keyword() {
        let extracted = extract_series_from_title("The Eye of the World (The Wheel of Time, Book 1)");
        assert_eq!(extracted.clean_title, "The Eye of the World");
        assert_eq!(extracted.series_name.as_deref(), Some("The Wheel of Time"));
        assert_eq!(extracted.series_position, Some(1.0));
    }

    #[test]
    fn extracts_colon_series() {
        let extracted = extract_series_from_title("Leviathan Wakes: The Expanse #1");
        assert_eq!(extracted.clean_title, "Leviathan Wakes");
        assert_eq!(extracted.series_name.as_deref(), Some("The Expanse"));
        assert_eq!(extracted.series_position, Some(1.0));
    }

    #[test]
    fn extracts_comma_book_convention() {
        let extracted = extract_series_from_title("The Wheel of Time, Book 4");
        assert_eq!(extracted.clean_title, "The Wheel of Time");
        assert_eq!(extracted.series_name.as_deref(), Some("The Wheel of Time"));
        assert_eq!(extracted.series_position, Some(4.0));
    }

    #[test]
    fn no_series_pattern_leaves_title_unchanged() {
        let extracted = extract_series_from_title("A Standalone Novel");
        assert_eq!(extracted.clean_title, "A Standalone Novel");
        assert!(extracted.series_name.is_none());
        assert!(extracted.series_position.is_none());
    }
}

//! Confidence score extraction ("Confidence: 8/10" → 0.8).

use regex::Regex;
use std::sync::LazyLock;

/// Returned when the text carries no recognizable score.
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Tried in order against the lowercased text; only the first hit counts.
static CONFIDENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"confidence[:\s]+(\d{1,2})[/\s]*(?:10)?",
        r"certainty[:\s]+(\d{1,2})[/\s]*(?:10)?",
        r"confidence.*?(\d{1,2}).*?(?:out of|/)\s*10",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid confidence regex pattern"))
    .collect()
});

/// Extract a confidence score on a 0-10 scale and normalize it to `[0, 1]`.
///
/// # Examples
///
/// ```
/// use medilens::extract::extract_confidence;
///
/// assert_eq!(extract_confidence("Confidence: 8/10"), 0.8);
/// assert_eq!(extract_confidence("no score mentioned"), 0.7);
/// ```
pub fn extract_confidence(text: &str) -> f64 {
    let lower = text.to_lowercase();

    CONFIDENCE_PATTERNS
        .iter()
        .find_map(|re| re.captures(&lower))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|score| (f64::from(score) / 10.0).min(1.0))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

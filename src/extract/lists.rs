//! Line-list extraction: bulleted findings, differentials, normal structures.

use regex::Regex;
use std::sync::LazyLock;

/// Leading list markers: digits, dots, dashes, asterisks, bullets, whitespace.
static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d.\-*•\s]+").expect("Invalid bullet prefix regex"));

const NORMAL_KEYWORDS: &[&str] = &[
    "normal",
    "unremarkable",
    "within normal limits",
    "no evidence",
];

/// At most this many key findings are kept.
pub const MAX_KEY_FINDINGS: usize = 5;
/// At most this many differential diagnoses are kept.
pub const MAX_DIFFERENTIALS: usize = 3;
/// Shorter differentials are fragments, not diagnoses.
pub const MIN_DIFFERENTIAL_CHARS: usize = 10;

/// Strip list markers from each line and return the first `limit` items.
///
/// Markdown heading lines (`#`) are skipped, as are items that are empty or
/// shorter than `min_chars` characters after stripping.
///
/// # Examples
///
/// ```
/// use medilens::extract::extract_bullets;
///
/// let items = extract_bullets("1. Finding A\n- Finding B\n* Finding C\n\n", 5, 0);
/// assert_eq!(items, vec!["Finding A", "Finding B", "Finding C"]);
/// ```
pub fn extract_bullets(text: &str, limit: usize, min_chars: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| BULLET_PREFIX.replace(line, "").into_owned())
        .filter(|item| !item.is_empty() && item.chars().count() >= min_chars)
        .take(limit)
        .collect()
}

/// Up to five abnormal findings.
pub fn extract_key_findings(text: &str) -> Vec<String> {
    extract_bullets(text, MAX_KEY_FINDINGS, 0)
}

/// Up to three differential diagnoses of at least ten characters.
pub fn extract_differentials(text: &str) -> Vec<String> {
    extract_bullets(text, MAX_DIFFERENTIALS, MIN_DIFFERENTIAL_CHARS)
}

/// Every line describing a normal structure, trimmed, unbounded.
pub fn extract_normal_findings(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            NORMAL_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|line| line.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_mixed_markers() {
        let items = extract_bullets("1. Finding A\n- Finding B\n* Finding C\n\n", 5, 0);
        assert_eq!(items, vec!["Finding A", "Finding B", "Finding C"]);
    }

    #[test]
    fn strips_bullet_glyph_and_nested_numbering() {
        let items = extract_bullets("• Consolidation\n  2.1. Effusion\n-- Nodule", 5, 0);
        assert_eq!(items, vec!["Consolidation", "Effusion", "Nodule"]);
    }

    #[test]
    fn skips_headings_and_marker_only_lines() {
        let items = extract_bullets("## Abnormal\n-\n3.\n- Real item", 5, 0);
        assert_eq!(items, vec!["Real item"]);
    }

    #[test]
    fn key_findings_capped_at_five() {
        let text = (1..=8)
            .map(|i| format!("{}. Finding {}", i, i))
            .collect::<Vec<_>>()
            .join("\n");
        let items = extract_key_findings(&text);
        assert_eq!(items.len(), 5);
        assert_eq!(items[0], "Finding 1");
        assert_eq!(items[4], "Finding 5");
    }

    #[test]
    fn differentials_filter_short_items_and_cap_at_three() {
        let text = "1. Lobar pneumonia\n2. ARDS\n3. Cardiogenic pulmonary edema\n\
                    4. Diffuse alveolar hemorrhage\n5. Atypical infection\n6. Lymphangitic spread";
        let items = extract_differentials(text);
        assert_eq!(
            items,
            vec![
                "Lobar pneumonia",
                "Cardiogenic pulmonary edema",
                "Diffuse alveolar hemorrhage"
            ]
        );
        assert!(items.iter().all(|d| d.chars().count() >= MIN_DIFFERENTIAL_CHARS));
    }

    #[test]
    fn differential_length_boundary() {
        // Exactly ten characters is kept; nine is dropped.
        assert_eq!(extract_differentials("- Abcdefghij"), vec!["Abcdefghij"]);
        assert!(extract_differentials("- Abcdefghi").is_empty());
    }

    #[test]
    fn empty_block_yields_nothing() {
        assert!(extract_key_findings("").is_empty());
        assert!(extract_differentials("   \n").is_empty());
    }

    #[test]
    fn normal_findings_keyword_lines() {
        let text = "Heart size is normal.\n\
                    Right lower lobe opacity.\n\
                    Osseous structures are unremarkable.\n\
                    No evidence of pneumothorax.\n\
                    Mediastinum within normal limits.";
        let items = extract_normal_findings(text);
        assert_eq!(
            items,
            vec![
                "Heart size is normal.",
                "Osseous structures are unremarkable.",
                "No evidence of pneumothorax.",
                "Mediastinum within normal limits."
            ]
        );
    }

    #[test]
    fn normal_findings_unbounded() {
        let text = vec!["normal"; 12].join("\n");
        assert_eq!(extract_normal_findings(&text).len(), 12);
    }
}

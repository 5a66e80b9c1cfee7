//! Ordered-vocabulary classifiers for modality, region, and image quality.
//!
//! All three scan the lowercased text for substrings and return the first
//! vocabulary entry that hits. Vocabulary order, not position in the text,
//! decides ties.

use crate::findings::{AnatomicalRegion, ImageQuality, Modality};

const MODALITIES: &[(&str, Modality)] = &[
    ("x-ray", Modality::XRay),
    ("ct", Modality::Ct),
    ("mri", Modality::Mri),
    ("ultrasound", Modality::Ultrasound),
    ("mammography", Modality::Mammography),
    ("pet", Modality::Pet),
    ("nuclear", Modality::Nuclear),
];

const REGIONS: &[(&str, AnatomicalRegion)] = &[
    ("chest", AnatomicalRegion::Chest),
    ("abdomen", AnatomicalRegion::Abdomen),
    ("pelvis", AnatomicalRegion::Pelvis),
    ("head", AnatomicalRegion::Head),
    ("neck", AnatomicalRegion::Neck),
    ("spine", AnatomicalRegion::Spine),
    ("extremity", AnatomicalRegion::Extremity),
    ("heart", AnatomicalRegion::Heart),
    ("lung", AnatomicalRegion::Lung),
];

const QUALITY_LEVELS: &[(ImageQuality, &[&str])] = &[
    (ImageQuality::Excellent, &["excellent", "optimal", "high quality"]),
    (ImageQuality::Good, &["good", "adequate", "satisfactory"]),
    (ImageQuality::Fair, &["fair", "moderate", "acceptable"]),
    (ImageQuality::Poor, &["poor", "suboptimal", "limited", "degraded"]),
];

fn first_term<T: Copy>(text: &str, vocabulary: &[(&str, T)]) -> Option<T> {
    let lower = text.to_lowercase();
    vocabulary
        .iter()
        .find(|(term, _)| lower.contains(term))
        .map(|(_, value)| *value)
}

/// Imaging modality named in the text, or [`Modality::Unknown`].
pub fn extract_modality(text: &str) -> Modality {
    first_term(text, MODALITIES).unwrap_or(Modality::Unknown)
}

/// Anatomical region named in the text, or [`AnatomicalRegion::Unspecified`].
pub fn extract_region(text: &str) -> AnatomicalRegion {
    first_term(text, REGIONS).unwrap_or(AnatomicalRegion::Unspecified)
}

/// Overall image quality described by a technical-quality block.
pub fn classify_quality(text: &str) -> ImageQuality {
    let lower = text.to_lowercase();
    QUALITY_LEVELS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(level, _)| *level)
        .unwrap_or(ImageQuality::NotAssessed)
}

//! Structured findings extracted from the analysis stage's response.

use crate::extract::{self, Sections, DEFAULT_CONFIDENCE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Imaging modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Modality {
    #[serde(rename = "x-ray")]
    XRay,
    #[serde(rename = "ct")]
    Ct,
    #[serde(rename = "mri")]
    Mri,
    #[serde(rename = "ultrasound")]
    Ultrasound,
    #[serde(rename = "mammography")]
    Mammography,
    #[serde(rename = "pet")]
    Pet,
    #[serde(rename = "nuclear")]
    Nuclear,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::XRay => "x-ray",
            Modality::Ct => "ct",
            Modality::Mri => "mri",
            Modality::Ultrasound => "ultrasound",
            Modality::Mammography => "mammography",
            Modality::Pet => "pet",
            Modality::Nuclear => "nuclear",
            Modality::Unknown => "unknown",
        }
    }
}

/// Primary anatomical region shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnatomicalRegion {
    Chest,
    Abdomen,
    Pelvis,
    Head,
    Neck,
    Spine,
    Extremity,
    Heart,
    Lung,
    #[default]
    Unspecified,
}

impl AnatomicalRegion {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnatomicalRegion::Chest => "chest",
            AnatomicalRegion::Abdomen => "abdomen",
            AnatomicalRegion::Pelvis => "pelvis",
            AnatomicalRegion::Head => "head",
            AnatomicalRegion::Neck => "neck",
            AnatomicalRegion::Spine => "spine",
            AnatomicalRegion::Extremity => "extremity",
            AnatomicalRegion::Heart => "heart",
            AnatomicalRegion::Lung => "lung",
            AnatomicalRegion::Unspecified => "unspecified",
        }
    }
}

/// Overall technical quality of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageQuality {
    #[serde(rename = "excellent")]
    Excellent,
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "fair")]
    Fair,
    #[serde(rename = "poor")]
    Poor,
    #[default]
    #[serde(rename = "not assessed")]
    NotAssessed,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Excellent => "excellent",
            ImageQuality::Good => "good",
            ImageQuality::Fair => "fair",
            ImageQuality::Poor => "poor",
            ImageQuality::NotAssessed => "not assessed",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}

display_as_str!(Modality, AnatomicalRegion, ImageQuality);

/// Typed facts about one image, consumed by the later stages.
///
/// Built once per run and never modified afterwards. `Default` is the
/// all-sentinel value used when the analysis call failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub modality: Modality,
    pub anatomical_region: AnatomicalRegion,
    /// At most five abnormal findings.
    pub key_findings: Vec<String>,
    pub normal_structures: Vec<String>,
    pub image_quality: ImageQuality,
    /// Normalized to `[0, 1]`.
    pub confidence: f64,
    /// At most three, each at least ten characters.
    pub differential_diagnoses: Vec<String>,
}

impl Default for Findings {
    fn default() -> Self {
        Self {
            modality: Modality::Unknown,
            anatomical_region: AnatomicalRegion::Unspecified,
            key_findings: Vec::new(),
            normal_structures: Vec::new(),
            image_quality: ImageQuality::NotAssessed,
            confidence: DEFAULT_CONFIDENCE,
            differential_diagnoses: Vec::new(),
        }
    }
}

impl Findings {
    /// Extract findings from the raw text of an analysis response.
    pub fn from_response(text: &str) -> Self {
        let sections = extract::split_sections(text);
        Self::from_sections(&sections, extract::extract_confidence(text))
    }

    /// Build findings from an already-split response.
    pub fn from_sections(sections: &Sections, confidence: f64) -> Self {
        let visual = sections.visual_findings.as_str();
        Self {
            modality: extract::extract_modality(visual),
            anatomical_region: extract::extract_region(visual),
            key_findings: extract::extract_key_findings(&sections.abnormal_findings),
            normal_structures: extract::extract_normal_findings(visual),
            image_quality: extract::classify_quality(&sections.technical_quality),
            confidence: confidence.clamp(0.0, 1.0),
            differential_diagnoses: extract::extract_differentials(
                &sections.differential_diagnosis,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHEST_RESPONSE: &str = "\
**VISUAL ANALYSIS:**
Frontal chest x-ray, PA projection.
The cardiac silhouette is normal in size.
No evidence of pneumothorax.

**ABNORMAL FINDINGS:**
1. Patchy opacity in the right lower lobe
2. Small right pleural effusion

**DIFFERENTIAL CONSIDERATIONS:**
1. Community-acquired pneumonia
2. Mass
3. Pulmonary infarction
4. Organizing pneumonia

**TECHNICAL FACTORS:**
Adequate inspiration and penetration.

**CONFIDENCE:**
Confidence: 8/10";

    #[test]
    fn extracts_all_fields_from_structured_response() {
        let f = Findings::from_response(CHEST_RESPONSE);
        assert_eq!(f.modality, Modality::XRay);
        assert_eq!(f.anatomical_region, AnatomicalRegion::Chest);
        assert_eq!(
            f.key_findings,
            vec![
                "Patchy opacity in the right lower lobe",
                "Small right pleural effusion"
            ]
        );
        assert_eq!(
            f.normal_structures,
            vec![
                "The cardiac silhouette is normal in size.",
                "No evidence of pneumothorax."
            ]
        );
        assert_eq!(f.image_quality, ImageQuality::Good);
        assert_eq!(f.confidence, 0.8);
        assert_eq!(
            f.differential_diagnoses,
            vec![
                "Community-acquired pneumonia",
                "Pulmonary infarction",
                "Organizing pneumonia"
            ]
        );
    }

    #[test]
    fn unstructured_text_degrades_to_sentinels() {
        let f = Findings::from_response("The model could not interpret this image.");
        assert_eq!(f.modality, Modality::Unknown);
        assert_eq!(f.anatomical_region, AnatomicalRegion::Unspecified);
        assert!(f.key_findings.is_empty());
        assert_eq!(f.image_quality, ImageQuality::NotAssessed);
        assert_eq!(f.confidence, DEFAULT_CONFIDENCE);
        assert!(f.differential_diagnoses.is_empty());
    }

    #[test]
    fn default_is_all_sentinels() {
        let f = Findings::default();
        assert_eq!(f.modality.as_str(), "unknown");
        assert_eq!(f.anatomical_region.as_str(), "unspecified");
        assert_eq!(f.image_quality.as_str(), "not assessed");
        assert_eq!(f.confidence, 0.7);
    }

    #[test]
    fn serializes_enums_as_lowercase_strings() {
        let f = Findings {
            modality: Modality::XRay,
            image_quality: ImageQuality::NotAssessed,
            ..Findings::default()
        };
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["modality"], "x-ray");
        assert_eq!(json["anatomical_region"], "unspecified");
        assert_eq!(json["image_quality"], "not assessed");

        let back: Findings = serde_json::from_value(json).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(Modality::Mri.to_string(), "mri");
        assert_eq!(AnatomicalRegion::Extremity.to_string(), "extremity");
        assert_eq!(ImageQuality::Excellent.to_string(), "excellent");
    }
}

//! # Findings extraction
//!
//! Deterministic, infallible heuristics that turn a free-text imaging
//! analysis into typed facts. A missing token never errors: every extractor
//! degrades to a sentinel (`unknown`, `not assessed`), an empty list, or
//! [`DEFAULT_CONFIDENCE`].
//!
//! | Function | Produces |
//! |----------|----------|
//! | [`split_sections`] | Named text blocks of the response |
//! | [`extract_confidence`] | Score in `[0, 1]` |
//! | [`extract_modality`] | [`Modality`](crate::Modality) |
//! | [`extract_region`] | [`AnatomicalRegion`](crate::AnatomicalRegion) |
//! | [`classify_quality`] | [`ImageQuality`](crate::ImageQuality) |
//! | [`extract_bullets`] | Marker-stripped list items |
//! | [`extract_key_findings`] | Up to 5 abnormal findings |
//! | [`extract_differentials`] | Up to 3 differential diagnoses |
//! | [`extract_normal_findings`] | Lines describing normal structures |

pub mod confidence;
pub mod lists;
pub mod sections;
pub mod vocab;

pub use confidence::{extract_confidence, DEFAULT_CONFIDENCE};
pub use lists::{
    extract_bullets, extract_differentials, extract_key_findings, extract_normal_findings,
};
pub use sections::{split_sections, Section, Sections};
pub use vocab::{classify_quality, extract_modality, extract_region};

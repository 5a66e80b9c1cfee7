//! Section classifier for free-text imaging analyses.
//!
//! Splits a response into the named blocks a radiology-style answer is
//! organized in. A line is a header when its upper-cased text contains one
//! of the markers below; headers move the cursor and are themselves
//! dropped. Everything else accumulates in the section under the cursor.

use serde::Serialize;

/// The named blocks of an analysis response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    VisualFindings,
    AbnormalFindings,
    AnatomicalAssessment,
    DifferentialDiagnosis,
    TechnicalQuality,
    Recommendations,
}

/// Header markers in priority order. The first group with a hit wins.
const HEADER_MARKERS: &[(&[&str], Section)] = &[
    (&["ABNORMAL FINDINGS"], Section::AbnormalFindings),
    (&["VISUAL ANALYSIS", "FINDINGS"], Section::VisualFindings),
    (&["MORPHOLOGICAL", "ASSESSMENT"], Section::AnatomicalAssessment),
    (&["DIFFERENTIAL", "DIAGNOSIS"], Section::DifferentialDiagnosis),
    (&["TECHNICAL", "QUALITY"], Section::TechnicalQuality),
    (&["RECOMMEND", "FOLLOW"], Section::Recommendations),
];

/// Text accumulated per section, trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sections {
    pub visual_findings: String,
    pub abnormal_findings: String,
    pub anatomical_assessment: String,
    pub differential_diagnosis: String,
    pub technical_quality: String,
    pub recommendations: String,
}

impl Sections {
    pub fn get(&self, section: Section) -> &str {
        match section {
            Section::VisualFindings => &self.visual_findings,
            Section::AbnormalFindings => &self.abnormal_findings,
            Section::AnatomicalAssessment => &self.anatomical_assessment,
            Section::DifferentialDiagnosis => &self.differential_diagnosis,
            Section::TechnicalQuality => &self.technical_quality,
            Section::Recommendations => &self.recommendations,
        }
    }

    fn buffer_mut(&mut self, section: Section) -> &mut String {
        match section {
            Section::VisualFindings => &mut self.visual_findings,
            Section::AbnormalFindings => &mut self.abnormal_findings,
            Section::AnatomicalAssessment => &mut self.anatomical_assessment,
            Section::DifferentialDiagnosis => &mut self.differential_diagnosis,
            Section::TechnicalQuality => &mut self.technical_quality,
            Section::Recommendations => &mut self.recommendations,
        }
    }

    fn trim_all(&mut self) {
        for buf in [
            &mut self.visual_findings,
            &mut self.abnormal_findings,
            &mut self.anatomical_assessment,
            &mut self.differential_diagnosis,
            &mut self.technical_quality,
            &mut self.recommendations,
        ] {
            *buf = buf.trim().to_string();
        }
    }
}

/// Classify a line as a section header, if it is one.
pub fn header_section(line: &str) -> Option<Section> {
    let upper = line.to_uppercase();
    HEADER_MARKERS
        .iter()
        .find(|(markers, _)| markers.iter().any(|m| upper.contains(m)))
        .map(|(_, section)| *section)
}

/// Split a response into [`Sections`].
///
/// Lines before the first header belong to the visual findings.
///
/// # Examples
///
/// ```
/// use medilens::extract::split_sections;
///
/// let s = split_sections("Chest radiograph.\nDIFFERENTIAL DIAGNOSIS\n1. Pneumonia");
/// assert_eq!(s.visual_findings, "Chest radiograph.");
/// assert_eq!(s.differential_diagnosis, "1. Pneumonia");
/// ```
pub fn split_sections(text: &str) -> Sections {
    let mut sections = Sections::default();
    let mut current = Section::VisualFindings;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(section) = header_section(line) {
            current = section;
            continue;
        }
        let buf = sections.buffer_mut(current);
        buf.push_str(line);
        buf.push('\n');
    }

    sections.trim_all();
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differential_header_routes_following_lines() {
        let text = "Frontal view of the chest.\n\
                    DIFFERENTIAL DIAGNOSIS:\n\
                    1. Community-acquired pneumonia\n\
                    2. Pulmonary edema";
        let s = split_sections(text);
        assert_eq!(s.visual_findings, "Frontal view of the chest.");
        assert_eq!(
            s.differential_diagnosis,
            "1. Community-acquired pneumonia\n2. Pulmonary edema"
        );
    }

    #[test]
    fn header_lines_are_dropped() {
        let s = split_sections("**VISUAL ANALYSIS:**\nLungs are clear.");
        assert_eq!(s.visual_findings, "Lungs are clear.");
    }

    #[test]
    fn unmatched_leading_lines_go_to_visual_findings() {
        let s = split_sections("Line one\nLine two\n**TECHNICAL FACTORS**\nGood penetration");
        assert_eq!(s.visual_findings, "Line one\nLine two");
        assert_eq!(s.technical_quality, "Good penetration");
    }

    #[test]
    fn blank_lines_skipped_and_sections_trimmed() {
        let s = split_sections("\n\n   Heart size normal.   \n\n\nRECOMMENDATIONS\n\n  Lateral view.  \n");
        assert_eq!(s.visual_findings, "Heart size normal.");
        assert_eq!(s.recommendations, "Lateral view.");
    }

    #[test]
    fn abnormal_findings_beat_generic_findings_marker() {
        assert_eq!(
            header_section("4. Abnormal Findings:"),
            Some(Section::AbnormalFindings)
        );
        assert_eq!(header_section("Normal Findings:"), Some(Section::VisualFindings));
    }

    #[test]
    fn first_marker_in_priority_order_wins() {
        // Contains both ASSESSMENT and QUALITY markers.
        assert_eq!(
            header_section("Quality assessment"),
            Some(Section::AnatomicalAssessment)
        );
        // Contains both DIAGNOSIS and RECOMMEND markers.
        assert_eq!(
            header_section("Diagnosis and recommendations"),
            Some(Section::DifferentialDiagnosis)
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(header_section("follow-up"), Some(Section::Recommendations));
        assert_eq!(header_section("Plain text"), None);
    }

    #[test]
    fn empty_input_yields_empty_sections() {
        assert_eq!(split_sections(""), Sections::default());
    }

    #[test]
    fn get_returns_matching_buffer() {
        let s = split_sections("ABNORMAL FINDINGS\n- Opacity");
        assert_eq!(s.get(Section::AbnormalFindings), "- Opacity");
        assert_eq!(s.get(Section::VisualFindings), "");
    }
}

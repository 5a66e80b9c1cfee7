//! Vision analysis of the input image.

use super::{Stage, StageError, StageOutput};
use crate::findings::Findings;
use crate::gateway::InferenceGateway;
use crate::imaging;
use crate::prompt::{self, PromptVars};
use crate::state::{PipelineState, StageKind};
use async_trait::async_trait;
use tracing::info;

const ANALYSIS_TEMPLATE: &str = "\
As an expert medical imaging specialist, analyze this medical image systematically. \
Use the section headers below exactly as written.

VISUAL ANALYSIS:
- Image type: identify the modality (X-ray, CT, MRI, ultrasound, mammography, PET, nuclear) \
and the anatomical region shown
- Anatomical structures: describe the visible structures and their appearance
- Normal structures: list structures that appear normal or unremarkable

ABNORMAL FINDINGS:
- One line per abnormality, lesion, or concerning feature

MORPHOLOGICAL ASSESSMENT:
- Size and shape, density or signal, borders and margins, symmetry, associated findings

DIFFERENTIAL DIAGNOSIS:
- One line per diagnostic possibility, most likely first

TECHNICAL QUALITY:
- Overall quality (excellent, good, fair, or poor), positioning, contrast, artifacts

RECOMMENDATIONS:
- Additional imaging or views if needed

End with a line of the form \"Confidence: N/10\" rating your confidence in the analysis.{clinical_context}

Provide your analysis in a structured, professional medical imaging report format.";

const CLINICAL_CONTEXT_TEMPLATE: &str = "

CLINICAL CONTEXT:
{query}

Please address this specific clinical question in your analysis.";

/// Build the analysis prompt, adding the clinical question when there is one.
pub fn analysis_prompt(clinical_query: &str) -> String {
    let clinical_context = if clinical_query.trim().is_empty() {
        String::new()
    } else {
        prompt::render(
            CLINICAL_CONTEXT_TEMPLATE,
            &PromptVars::new().insert("query", clinical_query.trim()),
        )
    };
    prompt::render(
        ANALYSIS_TEMPLATE,
        &PromptVars::new().insert("clinical_context", clinical_context),
    )
}

/// Validates and encodes the image, asks the vision model about it, and
/// extracts [`Findings`] from the answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalysisStage;

#[async_trait]
impl Stage for AnalysisStage {
    fn kind(&self) -> StageKind {
        StageKind::Analysis
    }

    async fn run(
        &self,
        gateway: &InferenceGateway,
        state: &PipelineState,
    ) -> Result<StageOutput, StageError> {
        let path = state.image_path().to_path_buf();
        let image = tokio::task::spawn_blocking(move || imaging::load_image(&path))
            .await
            .map_err(|e| StageError::Task(e.to_string()))??;

        let response = gateway
            .invoke(analysis_prompt(state.clinical_query()), Some(&image))
            .await?;

        let findings = Findings::from_response(&response);
        info!(
            modality = %findings.modality,
            region = %findings.anatomical_region,
            key_findings = findings.key_findings.len(),
            confidence = findings.confidence,
            "extracted image findings"
        );
        Ok(StageOutput::Findings(findings))
    }

    fn degraded(&self, _message: &str) -> StageOutput {
        StageOutput::Findings(Findings::default())
    }
}

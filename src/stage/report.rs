//! Final report compilation.

use super::{findings_vars, Stage, StageError, StageOutput};
use crate::gateway::InferenceGateway;
use crate::prompt;
use crate::state::{PipelineState, StageKind};
use async_trait::async_trait;

const REPORT_TEMPLATE: &str = "\
You are a medical AI assistant tasked with compiling a complete diagnostic report.

---
IMAGE FINDINGS:
Modality: {modality}
Region: {region}
Key Abnormalities: {key_findings}
Normal Structures: {normal_structures}
Image Quality: {image_quality}
Confidence Score: {confidence}
Differential Considerations:
{differentials}

---
DIAGNOSTIC REASONING:
{reasoning}

---
CRITICAL REVIEW:
{critique}

---
Please compile these inputs into a professional, structured medical imaging report suitable \
for clinical documentation. Use medical terminology, and ensure the flow is logical and complete.
Include sections such as:
- Imaging Summary
- Diagnostic Impression
- Reviewer Comments
- Confidence Level
- Recommendations";

pub fn report_prompt(state: &PipelineState) -> String {
    let vars = findings_vars(&state.findings_or_default())
        .insert("reasoning", state.reasoning())
        .insert("critique", state.critique());
    prompt::render(REPORT_TEMPLATE, &vars)
}

/// Compiles findings, reasoning and critique into the final report.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportStage;

#[async_trait]
impl Stage for ReportStage {
    fn kind(&self) -> StageKind {
        StageKind::Report
    }

    async fn run(
        &self,
        gateway: &InferenceGateway,
        state: &PipelineState,
    ) -> Result<StageOutput, StageError> {
        let text = gateway.invoke(report_prompt(state), None).await?;
        Ok(StageOutput::Report(text))
    }

    fn degraded(&self, message: &str) -> StageOutput {
        StageOutput::Report(message.to_string())
    }
}

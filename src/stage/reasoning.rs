//! Diagnostic reasoning over the extracted findings.

use super::{findings_vars, Stage, StageError, StageOutput};
use crate::gateway::InferenceGateway;
use crate::prompt;
use crate::state::{PipelineState, StageKind};
use async_trait::async_trait;

const REASONING_TEMPLATE: &str = "\
You are a clinical decision support assistant. Given the following imaging findings and optional \
medical knowledge, reason through what diagnosis is most likely, what differentials should be \
considered, and explain your reasoning.

---
FINDINGS:
Modality: {modality}
Region: {region}
Key Findings: {key_findings}
Normal Structures: {normal_structures}
Image Quality: {image_quality}
Confidence Score: {confidence}
---
CONTEXT:
{context}
---

Please structure your response into:
1. Primary Diagnostic Impression
2. Differential Diagnoses (at least 2)
3. Justification / Reasoning
4. Any additional recommended tests or steps";

pub fn reasoning_prompt(state: &PipelineState) -> String {
    let vars = findings_vars(&state.findings_or_default()).insert(
        "context",
        prompt::context_or_default(state.retrieved_context()),
    );
    prompt::render(REASONING_TEMPLATE, &vars)
}

/// Synthesizes the findings and any retrieved context into a diagnostic impression.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningStage;

#[async_trait]
impl Stage for ReasoningStage {
    fn kind(&self) -> StageKind {
        StageKind::Reasoning
    }

    async fn run(
        &self,
        gateway: &InferenceGateway,
        state: &PipelineState,
    ) -> Result<StageOutput, StageError> {
        let text = gateway.invoke(reasoning_prompt(state), None).await?;
        Ok(StageOutput::Reasoning(text))
    }

    fn degraded(&self, message: &str) -> StageOutput {
        StageOutput::Reasoning(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Findings, Modality};
    use crate::gateway::MockBackend;
    use crate::prompt::NO_CONTEXT;
    use crate::stage::test_support;
    use std::sync::Arc;

    #[test]
    fn prompt_without_findings_uses_sentinels() {
        let state = PipelineState::new("scan.png", "", "");
        let prompt = reasoning_prompt(&state);
        assert!(prompt.contains("Modality: unknown"));
        assert!(prompt.contains("Region: unspecified"));
        assert!(prompt.contains("Confidence Score: 0.70"));
        assert!(prompt.contains(NO_CONTEXT));
    }

    #[test]
    fn prompt_injects_findings_and_context() {
        let mut state = PipelineState::new("scan.png", "", "Edema presents with infiltrates.");
        state
            .apply(StageOutput::Findings(Findings {
                modality: Modality::Ct,
                key_findings: vec!["ground-glass opacity".into()],
                ..Findings::default()
            }))
            .unwrap();

        let prompt = reasoning_prompt(&state);
        assert!(prompt.contains("Modality: ct"));
        assert!(prompt.contains("Key Findings: ground-glass opacity"));
        assert!(prompt.contains("CONTEXT:\nEdema presents with infiltrates.\n"));
        assert!(!prompt.contains(NO_CONTEXT));
    }

    #[test]
    fn context_with_placeholder_text_is_injected_verbatim() {
        let state = PipelineState::new("scan.png", "", "Template note: see {modality} field");
        let prompt = reasoning_prompt(&state);
        assert!(prompt.contains("CONTEXT:\nTemplate note: see {modality} field\n"));
        assert!(prompt.contains("Modality: unknown"));
    }

    #[tokio::test]
    async fn returns_model_text_without_image() {
        let mock = Arc::new(MockBackend::fixed("Primary impression: pneumonia"));
        let gateway = test_support::gateway(mock.clone());
        let state = PipelineState::new("scan.png", "", "");

        let output = ReasoningStage.run(&gateway, &state).await.unwrap();
        assert_eq!(
            output,
            StageOutput::Reasoning("Primary impression: pneumonia".into())
        );
        assert!(mock.requests()[0].image.is_none());
    }

    #[test]
    fn degraded_output_is_the_error_text() {
        assert_eq!(
            ReasoningStage.degraded("HTTP 503: overloaded"),
            StageOutput::Reasoning("HTTP 503: overloaded".into())
        );
    }
}

//! Critical review of the diagnostic reasoning.

use super::{Stage, StageError, StageOutput};
use crate::gateway::InferenceGateway;
use crate::prompt::{self, PromptVars};
use crate::state::{PipelineState, StageKind};
use async_trait::async_trait;

const CRITIQUE_TEMPLATE: &str = "\
You are a senior clinical reviewer. Given the diagnostic reasoning below, identify possible \
errors, risks, and overlooked differentials. Suggest improvements or clarifications.

---
DIAGNOSTIC REPORT:
{reasoning}
---
CONTEXT:
{context}
---

Please structure your output as:
1. Potential Risks or Missed Diagnoses
2. Alternative Interpretations
3. Suggestions for Improvement or Clarification
4. Clinical Safety Notes (if any)";

pub fn critique_prompt(state: &PipelineState) -> String {
    let vars = PromptVars::new()
        .insert("reasoning", state.reasoning())
        .insert(
            "context",
            prompt::context_or_default(state.retrieved_context()),
        );
    prompt::render(CRITIQUE_TEMPLATE, &vars)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CritiqueStage;

#[async_trait]
impl Stage for CritiqueStage {
    fn kind(&self) -> StageKind {
        StageKind::Critique
    }

    async fn run(
        &self,
        gateway: &InferenceGateway,
        state: &PipelineState,
    ) -> Result<StageOutput, StageError> {
        let text = gateway.invoke(critique_prompt(state), None).await?;
        Ok(StageOutput::Critique(text))
    }

    fn degraded(&self, message: &str) -> StageOutput {
        StageOutput::Critique(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::NO_CONTEXT;

    #[test]
    fn prompt_embeds_reasoning_text() {
        let mut state = PipelineState::new("scan.png", "", "");
        state
            .apply(StageOutput::Reasoning("Likely pulmonary edema.".into()))
            .unwrap();
        let prompt = critique_prompt(&state);
        assert!(prompt.contains("DIAGNOSTIC REPORT:\nLikely pulmonary edema.\n"));
        assert!(prompt.contains(NO_CONTEXT));
    }

    #[test]
    fn missing_reasoning_renders_empty() {
        let state = PipelineState::new("scan.png", "", "BNP guidance");
        let prompt = critique_prompt(&state);
        assert!(prompt.contains("DIAGNOSTIC REPORT:\n\n---"));
        assert!(prompt.contains("CONTEXT:\nBNP guidance\n"));
    }

    #[test]
    fn degraded_output_is_the_error_text() {
        assert_eq!(
            CritiqueStage.degraded("timeout"),
            StageOutput::Critique("timeout".into())
        );
    }
}

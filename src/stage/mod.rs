//! The four diagnostic stages and the contract the executor drives them by.
//!
//! A stage reads the shared [`PipelineState`], makes one inference call,
//! and returns a [`StageOutput`] for the executor to write. Stages never
//! mutate the state themselves.

pub mod analysis;
pub mod critique;
pub mod reasoning;
pub mod report;

pub use analysis::AnalysisStage;
pub use critique::CritiqueStage;
pub use reasoning::ReasoningStage;
pub use report::ReportStage;

use crate::error::{GatewayError, PipelineError, ValidationError};
use crate::findings::Findings;
use crate::gateway::InferenceGateway;
use crate::prompt::{self, PromptVars};
use crate::state::{PipelineState, StageKind};
use async_trait::async_trait;
use thiserror::Error;

/// The value a stage produces, one variant per writable state field.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Findings(Findings),
    Reasoning(String),
    Critique(String),
    Report(String),
}

impl StageOutput {
    /// The stage that owns this output's field.
    pub fn kind(&self) -> StageKind {
        match self {
            StageOutput::Findings(_) => StageKind::Analysis,
            StageOutput::Reasoning(_) => StageKind::Reasoning,
            StageOutput::Critique(_) => StageKind::Critique,
            StageOutput::Report(_) => StageKind::Report,
        }
    }
}

/// Why a stage did not produce output.
#[derive(Error, Debug)]
pub enum StageError {
    /// The input image was rejected. Aborts the run.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The inference call failed. The executor substitutes degraded output.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A blocking helper task panicked or was cancelled. Aborts the run.
    #[error("background task failed: {0}")]
    Task(String),
}

impl StageError {
    /// Whether the executor must stop the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, StageError::Gateway(_))
    }

    /// The error a run aborted by this failure returns.
    pub fn into_pipeline_error(self, stage: StageKind) -> PipelineError {
        match self {
            StageError::Validation(e) => PipelineError::Validation(e),
            StageError::Task(message) => PipelineError::StageFailed {
                stage: stage.to_string(),
                message,
            },
            StageError::Gateway(e) => PipelineError::StageFailed {
                stage: stage.to_string(),
                message: e.to_string(),
            },
        }
    }
}

/// One step of the diagnostic pipeline.
///
/// Object-safe so the executor can hold `Box<dyn Stage>`.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Produce this stage's output from the state so far.
    async fn run(
        &self,
        gateway: &InferenceGateway,
        state: &PipelineState,
    ) -> Result<StageOutput, StageError>;

    /// Output written in place of a failed inference call.
    fn degraded(&self, message: &str) -> StageOutput;
}

/// The stages in execution order.
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(AnalysisStage),
        Box::new(ReasoningStage),
        Box::new(CritiqueStage),
        Box::new(ReportStage),
    ]
}

/// Template variables describing a [`Findings`] value.
///
/// Sets `modality`, `region`, `key_findings`, `normal_structures`,
/// `image_quality`, `confidence` and `differentials`.
pub(crate) fn findings_vars(findings: &Findings) -> PromptVars {
    PromptVars::new()
        .insert("modality", findings.modality.as_str())
        .insert("region", findings.anatomical_region.as_str())
        .insert("key_findings", prompt::inline_list(&findings.key_findings))
        .insert(
            "normal_structures",
            prompt::inline_list(&findings.normal_structures),
        )
        .insert("image_quality", findings.image_quality.as_str())
        .insert("confidence", format!("{:.2}", findings.confidence))
        .insert(
            "differentials",
            prompt::numbered_list(&findings.differential_diagnoses),
        )
}

//! The record threaded through one pipeline run.

use crate::error::Result;
use crate::findings::Findings;
use crate::stage::StageOutput;
use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// The four stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Analysis,
    Reasoning,
    Critique,
    Report,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Analysis,
        StageKind::Reasoning,
        StageKind::Critique,
        StageKind::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Analysis => "analysis",
            StageKind::Reasoning => "reasoning",
            StageKind::Critique => "critique",
            StageKind::Report => "report",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage whose inference call failed and whose output is the degraded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: StageKind,
    pub message: String,
}

/// Inputs plus every stage output of a single run.
///
/// Stages only ever see `&PipelineState`; the executor applies their
/// [`StageOutput`]s. Each output field accepts exactly one write.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineState {
    image_path: PathBuf,
    clinical_query: String,
    retrieved_context: String,
    image_findings: Option<Findings>,
    reasoning: Option<String>,
    critique: Option<String>,
    final_report: Option<String>,
    failures: Vec<StageFailure>,
}

impl PipelineState {
    pub fn new(
        image_path: impl Into<PathBuf>,
        clinical_query: impl Into<String>,
        retrieved_context: impl Into<String>,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            clinical_query: clinical_query.into(),
            retrieved_context: retrieved_context.into(),
            ..Self::default()
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn clinical_query(&self) -> &str {
        &self.clinical_query
    }

    pub fn retrieved_context(&self) -> &str {
        &self.retrieved_context
    }

    /// Findings from the analysis stage, if it has run.
    pub fn image_findings(&self) -> Option<&Findings> {
        self.image_findings.as_ref()
    }

    /// Findings from the analysis stage, or the all-sentinel value.
    pub fn findings_or_default(&self) -> Findings {
        self.image_findings.clone().unwrap_or_default()
    }

    /// Reasoning text, empty until the reasoning stage has run.
    pub fn reasoning(&self) -> &str {
        self.reasoning.as_deref().unwrap_or_default()
    }

    /// Critique text, empty until the critique stage has run.
    pub fn critique(&self) -> &str {
        self.critique.as_deref().unwrap_or_default()
    }

    /// The compiled report, empty until the report stage has run.
    pub fn final_report(&self) -> &str {
        self.final_report.as_deref().unwrap_or_default()
    }

    /// Stages that returned degraded output, in execution order.
    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    /// True when at least one stage's output is an error message or sentinel.
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    /// True once every output field has been written.
    pub fn is_complete(&self) -> bool {
        self.image_findings.is_some()
            && self.reasoning.is_some()
            && self.critique.is_some()
            && self.final_report.is_some()
    }

    /// Write a stage's output into its field.
    pub(crate) fn apply(&mut self, output: StageOutput) -> Result<()> {
        let kind = output.kind();
        let written = match output {
            StageOutput::Findings(findings) => set_once(&mut self.image_findings, findings),
            StageOutput::Reasoning(text) => set_once(&mut self.reasoning, text),
            StageOutput::Critique(text) => set_once(&mut self.critique, text),
            StageOutput::Report(text) => set_once(&mut self.final_report, text),
        };
        if written {
            Ok(())
        } else {
            Err(PipelineError::StageFailed {
                stage: kind.to_string(),
                message: "output already written for this run".to_string(),
            })
        }
    }

    pub(crate) fn record_failure(&mut self, stage: StageKind, message: impl Into<String>) {
        self.failures.push(StageFailure {
            stage,
            message: message.into(),
        });
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}

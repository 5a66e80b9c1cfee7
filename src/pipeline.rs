use crate::{
    error::Result,
    gateway::InferenceGateway,
    stage::{self, Stage},
    state::{PipelineState, StageKind},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Input to a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInput {
    /// The image to analyze.
    pub image_path: PathBuf,

    /// Clinical question to address; empty when none was asked.
    pub clinical_query: String,

    /// Retrieved knowledge shown to the reasoning and critique stages.
    pub context: String,
}

impl PipelineInput {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            clinical_query: String::new(),
            context: String::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.clinical_query = query.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Progress update emitted as each stage starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProgress {
    /// Current stage index (0-based).
    pub stage_index: usize,

    /// Total number of stages in the pipeline.
    pub total_stages: usize,

    pub stage: StageKind,
}

/// Runs Analysis, Reasoning, Critique and Report in order over one image.
///
/// A failed inference call does not stop the run: the stage's degraded
/// output is written, the failure is recorded on the state, and the next
/// stage starts. A rejected image stops the run before any inference call.
///
/// `Pipeline` holds no per-run state, so one instance can serve concurrent
/// runs.
///
/// # Example
///
/// ```no_run
/// use medilens::{config::Settings, Pipeline};
///
/// # async fn demo() -> medilens::Result<()> {
/// let pipeline = Pipeline::new(Settings::from_env()?.gateway()?);
/// let state = pipeline.run("chest.jpg", "Rule out pneumonia", "").await?;
/// println!("{}", state.final_report());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    gateway: InferenceGateway,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages().collect::<Vec<_>>())
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl Pipeline {
    /// The four diagnostic stages, all calling through `gateway`.
    pub fn new(gateway: InferenceGateway) -> Self {
        Self {
            stages: stage::default_stages(),
            gateway,
        }
    }

    /// The stages in execution order.
    pub fn stages(&self) -> impl Iterator<Item = StageKind> + '_ {
        self.stages.iter().map(|s| s.kind())
    }

    pub fn gateway(&self) -> &InferenceGateway {
        &self.gateway
    }

    /// Run all stages over one image.
    pub async fn run(
        &self,
        image_path: impl Into<PathBuf>,
        clinical_query: &str,
        context: &str,
    ) -> Result<PipelineState> {
        let input = PipelineInput::new(image_path)
            .with_query(clinical_query)
            .with_context(context);
        self.run_input(input).await
    }

    pub async fn run_input(&self, input: PipelineInput) -> Result<PipelineState> {
        self.run_with_progress(input, |_| {}).await
    }

    /// Run all stages, invoking `on_progress` as each one starts.
    pub async fn run_with_progress<F>(
        &self,
        input: PipelineInput,
        mut on_progress: F,
    ) -> Result<PipelineState>
    where
        F: FnMut(PipelineProgress),
    {
        let mut state = PipelineState::new(input.image_path, input.clinical_query, input.context);
        let total_stages = self.stages.len();
        info!(image = %state.image_path().display(), "starting diagnostic pipeline");

        for (stage_index, stage) in self.stages.iter().enumerate() {
            let kind = stage.kind();
            on_progress(PipelineProgress {
                stage_index,
                total_stages,
                stage: kind,
            });
            info!(stage = %kind, step = stage_index + 1, total_stages, "stage started");

            let output = match stage.run(&self.gateway, &state).await {
                Ok(output) => output,
                Err(e) if e.is_fatal() => {
                    error!(stage = %kind, error = %e, "stage failed, aborting run");
                    return Err(e.into_pipeline_error(kind));
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(stage = %kind, error = %message, "inference failed, continuing with degraded output");
                    state.record_failure(kind, message.clone());
                    stage.degraded(&message)
                }
            };

            state.apply(output)?;
            info!(stage = %kind, "stage finished");
        }

        info!(
            image = %state.image_path().display(),
            degraded_stages = state.failures().len(),
            "diagnostic pipeline finished"
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, ValidationError};
    use crate::findings::{AnatomicalRegion, Findings, Modality};
    use crate::gateway::MockBackend;
    use crate::prompt::NO_CONTEXT;
    use crate::stage::test_support;
    use std::path::Path;
    use std::sync::Arc;

    const ANALYSIS_TEXT: &str = "\
VISUAL ANALYSIS:
Frontal chest x-ray.
Heart size is normal.

ABNORMAL FINDINGS:
1. Right lower lobe consolidation

DIFFERENTIAL DIAGNOSIS:
1. Bacterial pneumonia
2. Aspiration pneumonitis

TECHNICAL QUALITY:
Good inspiration.

Confidence: 8/10";

    fn write_png(dir: &Path, name: &str, side: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::new(side, side).save(&path).unwrap();
        path
    }

    fn canned() -> Vec<String> {
        vec![
            ANALYSIS_TEXT.to_string(),
            "REASONING".to_string(),
            "CRITIQUE".to_string(),
            "FINAL REPORT".to_string(),
        ]
    }

    #[test]
    fn pipeline_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn stages_are_in_fixed_order() {
        let mock = Arc::new(MockBackend::fixed("x"));
        let pipeline = Pipeline::new(test_support::gateway(mock));
        assert_eq!(pipeline.stages().collect::<Vec<_>>(), StageKind::ALL.to_vec());
    }

    #[tokio::test]
    async fn end_to_end_chest_xray() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "chest.png", 256);
        let mock = Arc::new(MockBackend::new(canned()));
        let pipeline = Pipeline::new(test_support::gateway(mock.clone()));

        let state = pipeline
            .run(&image, "shortness of breath", "")
            .await
            .unwrap();

        let findings = state.image_findings().expect("findings written");
        assert_eq!(findings.modality, Modality::XRay);
        assert_eq!(findings.anatomical_region, AnatomicalRegion::Chest);
        assert_eq!(findings.key_findings, vec!["Right lower lobe consolidation"]);
        assert_eq!(findings.confidence, 0.8);
        assert_eq!(
            findings.differential_diagnoses,
            vec!["Bacterial pneumonia", "Aspiration pneumonitis"]
        );
        assert_eq!(state.reasoning(), "REASONING");
        assert_eq!(state.critique(), "CRITIQUE");
        assert_eq!(state.final_report(), "FINAL REPORT");
        assert!(state.is_complete());
        assert!(!state.is_degraded());
        assert_eq!(mock.call_count(), 4);

        // Only the analysis call carries the image.
        let with_image: Vec<_> = mock.requests().iter().map(|r| r.image.is_some()).collect();
        assert_eq!(with_image, vec![true, false, false, false]);
        assert!(mock.requests()[0]
            .prompt
            .contains("CLINICAL CONTEXT:\nshortness of breath"));
    }

    #[tokio::test]
    async fn reasoning_failure_degrades_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "chest.png", 256);
        let mock = Arc::new(MockBackend::new(canned()).failing_on(1, "reasoning service down"));
        let pipeline = Pipeline::new(test_support::gateway(mock.clone()));

        let state = pipeline.run(&image, "", "").await.unwrap();

        assert_eq!(state.reasoning(), "reasoning service down");
        assert_eq!(state.critique(), "CRITIQUE");
        assert_eq!(state.final_report(), "FINAL REPORT");
        assert_eq!(state.failures().len(), 1);
        assert_eq!(state.failures()[0].stage, StageKind::Reasoning);
        assert_eq!(mock.call_count(), 4);

        // The critique prompt saw the degraded reasoning text.
        assert!(mock.requests()[2].prompt.contains("reasoning service down"));
    }

    #[tokio::test]
    async fn analysis_failure_yields_sentinel_findings() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "chest.png", 256);
        let mock = Arc::new(MockBackend::new(canned()).failing_on(0, "vision model offline"));
        let pipeline = Pipeline::new(test_support::gateway(mock));

        let state = pipeline.run(&image, "", "").await.unwrap();

        assert_eq!(state.image_findings(), Some(&Findings::default()));
        assert_eq!(state.failures()[0].stage, StageKind::Analysis);
        assert_eq!(state.failures()[0].message, "vision model offline");
        assert_eq!(state.final_report(), "FINAL REPORT");
    }

    #[tokio::test]
    async fn every_call_failing_still_returns_a_full_state() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "chest.png", 256);
        let mock = MockBackend::fixed("unused")
            .failing_on(0, "e0")
            .failing_on(1, "e1")
            .failing_on(2, "e2")
            .failing_on(3, "e3");
        let pipeline = Pipeline::new(test_support::gateway(Arc::new(mock)));

        let state = pipeline.run(&image, "", "").await.unwrap();
        assert!(state.is_complete());
        assert_eq!(state.failures().len(), 4);
        assert_eq!(state.final_report(), "e3");
    }

    #[tokio::test]
    async fn invalid_image_aborts_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "tiny.png", 50);
        let mock = Arc::new(MockBackend::new(canned()));
        let pipeline = Pipeline::new(test_support::gateway(mock.clone()));

        let err = pipeline.run(&image, "", "").await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::Dimensions { .. })
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn query_and_context_reach_the_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "chest.png", 256);
        let mock = Arc::new(MockBackend::new(canned()));
        let pipeline = Pipeline::new(test_support::gateway(mock.clone()));

        let input = PipelineInput::new(&image)
            .with_query("Rule out pneumonia")
            .with_context("Pneumonia presents with consolidation.");
        pipeline.run_input(input).await.unwrap();

        let prompts: Vec<_> = mock.requests().into_iter().map(|r| r.prompt).collect();
        assert!(prompts[0].contains("Rule out pneumonia"));
        assert!(prompts[1].contains("Pneumonia presents with consolidation."));
        assert!(prompts[1].contains("Modality: x-ray"));
        assert!(prompts[2].contains("Pneumonia presents with consolidation."));
        assert!(prompts[2].contains("REASONING"));
        assert!(prompts[3].contains("CRITIQUE"));
        assert!(!prompts[1].contains(NO_CONTEXT));
    }

    #[tokio::test]
    async fn progress_is_reported_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path(), "chest.png", 256);
        let mock = Arc::new(MockBackend::new(canned()));
        let pipeline = Pipeline::new(test_support::gateway(mock));

        let mut events = Vec::new();
        pipeline
            .run_with_progress(PipelineInput::new(&image), |p| events.push(p))
            .await
            .unwrap();

        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|p| p.total_stages == 4));
        let order: Vec<_> = events.iter().map(|p| (p.stage_index, p.stage)).collect();
        assert_eq!(
            order,
            vec![
                (0, StageKind::Analysis),
                (1, StageKind::Reasoning),
                (2, StageKind::Critique),
                (3, StageKind::Report),
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_runs_do_not_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "a.png", 128);
        let b = write_png(dir.path(), "b.png", 50);
        let mock = Arc::new(MockBackend::new(canned()));
        let pipeline = Pipeline::new(test_support::gateway(mock));

        let (ok, bad) = tokio::join!(pipeline.run(&a, "", ""), pipeline.run(&b, "", ""));
        assert_eq!(ok.unwrap().image_path(), a.as_path());
        assert!(bad.is_err());
    }
}

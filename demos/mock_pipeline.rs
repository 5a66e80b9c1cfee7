//! Example: running the full pipeline over MockBackend without a live model.
//!
//! Run with: `cargo run --example mock_pipeline`

use medilens::{InferenceGateway, MockBackend, Pipeline, PipelineInput};
use std::sync::Arc;

const ANALYSIS: &str = "\
VISUAL ANALYSIS:
Frontal chest x-ray. Heart size is normal.

ABNORMAL FINDINGS:
1. Right lower lobe consolidation

DIFFERENTIAL DIAGNOSIS:
1. Bacterial pneumonia
2. Aspiration pneumonitis

TECHNICAL QUALITY:
Good inspiration, adequate penetration.

Confidence: 8/10";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("medilens=debug"))
        .init();

    // A blank PNG is enough to pass validation
    let dir = tempfile::tempdir()?;
    let image_path = dir.path().join("chest_xray.png");
    image::RgbImage::new(256, 256).save(&image_path)?;

    // One canned response per stage, in order
    let mock = Arc::new(MockBackend::new(vec![
        ANALYSIS.to_string(),
        "Primary impression: right lower lobe pneumonia.".to_string(),
        "The impression is supported; consider aspiration given the lobe.".to_string(),
        "# Imaging Report\n\nRight lower lobe consolidation, most consistent with pneumonia."
            .to_string(),
    ]));
    let gateway = InferenceGateway::builder("http://unused")
        .backend(mock.clone())
        .build()?;
    let pipeline = Pipeline::new(gateway);

    let input = PipelineInput::new(&image_path)
        .with_query("shortness of breath")
        .with_context("Lobar consolidation with air bronchograms suggests bacterial pneumonia.");
    let state = pipeline
        .run_with_progress(input, |progress| {
            println!(
                "[{}/{}] {}",
                progress.stage_index + 1,
                progress.total_stages,
                progress.stage
            );
        })
        .await?;

    if let Some(findings) = state.image_findings() {
        println!("Modality: {}", findings.modality);
        println!("Region: {}", findings.anatomical_region);
        println!("Key findings: {:?}", findings.key_findings);
        println!("Confidence: {:.2}", findings.confidence);
    }
    println!("\n{}", state.final_report());
    println!("\nBackend calls: {}", mock.call_count());

    Ok(())
}

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::stream::{self, StreamExt};
use medilens::{config::Settings, knowledge, report, Pipeline, PipelineInput};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const PREVIEW_CHARS: usize = 500;
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Parser, Debug)]
#[command(name = "medilens")]
#[command(about = "Four-stage diagnostic pipeline over medical images")]
#[command(version)]
struct Cli {
    /// Image file, or a directory of .jpg/.jpeg/.png images.
    #[arg(long)]
    image: PathBuf,

    /// Clinical question for the analysis to address.
    #[arg(long, default_value = "")]
    query: String,

    /// Load the knowledge base as retrieved context.
    #[arg(long)]
    use_context: bool,

    /// Knowledge base directory (default: KNOWLEDGE_BASE_PATH).
    #[arg(long)]
    knowledge_base: Option<PathBuf>,

    /// Directory reports are written to.
    #[arg(long, default_value = "reports")]
    output: PathBuf,

    /// Images processed at the same time.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Print the full pipeline state as JSON instead of a preview.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    });
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let settings = Settings::from_env().context("loading configuration")?;
    info!(?settings, "configuration loaded");

    let context = if cli.use_context {
        let dir = cli
            .knowledge_base
            .clone()
            .unwrap_or_else(|| settings.knowledge_base.clone());
        match knowledge::load_context(&dir) {
            Ok(context) => context,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "knowledge base unavailable, continuing without context");
                String::new()
            }
        }
    } else {
        String::new()
    };

    let images = collect_images(&cli.image)?;
    let pipeline = Pipeline::new(settings.gateway()?);
    info!(images = images.len(), concurrency = cli.concurrency, "processing");

    let results: Vec<(PathBuf, Result<()>)> = stream::iter(images)
        .map(|path| {
            let pipeline = &pipeline;
            let cli = &cli;
            let context = context.as_str();
            async move {
                let result = process(pipeline, &path, cli, context).await;
                (path, result)
            }
        })
        .buffer_unordered(cli.concurrency.max(1))
        .collect()
        .await;

    let total = results.len();
    let mut failed = 0;
    for (path, result) in &results {
        if let Err(e) = result {
            failed += 1;
            let message = format!("{:#}", e);
            error!(image = %path.display(), error = %message, "image failed");
        }
    }

    if failed > 0 {
        bail!("{} of {} images failed", failed, total);
    }
    info!(total, "all images processed");
    Ok(())
}

/// Run the pipeline over one image, save its report, and print the result.
async fn process(pipeline: &Pipeline, path: &Path, cli: &Cli, context: &str) -> Result<()> {
    let input = PipelineInput::new(path)
        .with_query(cli.query.as_str())
        .with_context(context);
    let state = pipeline
        .run_input(input)
        .await
        .with_context(|| format!("analyzing {}", path.display()))?;

    if state.is_degraded() {
        let stages: Vec<_> = state.failures().iter().map(|f| f.stage.as_str()).collect();
        warn!(image = %path.display(), ?stages, "report contains degraded stage output");
    }

    let saved = report::save_markdown(&cli.output, path, state.final_report())
        .with_context(|| format!("saving report for {}", path.display()))?;

    let body = if cli.json {
        serde_json::to_string_pretty(&state)?
    } else {
        let preview: String = state.final_report().chars().take(PREVIEW_CHARS).collect();
        format!("{}...", preview)
    };
    println!(
        "=== {} ===\n{}\nReport saved to {}\n",
        path.display(),
        body,
        saved.display()
    );
    Ok(())
}

/// A single file, or the sorted images directly inside a directory.
fn collect_images(target: &Path) -> Result<Vec<PathBuf>> {
    if !target.is_dir() {
        return Ok(vec![target.to_path_buf()]);
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(target)
        .with_context(|| format!("reading {}", target.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    images.sort();

    if images.is_empty() {
        bail!("no .jpg, .jpeg or .png images in {}", target.display());
    }
    Ok(images)
}

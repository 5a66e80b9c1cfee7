//! # MediLens
//!
//! A four-stage diagnostic pipeline over a single medical image:
//!
//! 1. **Analysis**: a vision model describes the image; the free-text answer
//!    is turned into typed [`Findings`] by the [`extract`] heuristics.
//! 2. **Reasoning**: a text model synthesizes a diagnostic impression.
//! 3. **Critique**: a text model reviews that impression.
//! 4. **Report**: a text model compiles everything into the final report.
//!
//! Stages share a typed [`PipelineState`]. A failed inference call never
//! stops a run: the stage's output becomes the error text (or sentinel
//! findings) and the failure is recorded on the state. A rejected image
//! stops the run before any call is made.
//!
//! ## Core Concepts
//!
//! - **[`Pipeline`]**: runs the stages in order and applies their outputs.
//! - **[`Stage`](stage::Stage)**: object-safe trait each step implements.
//! - **[`InferenceGateway`]**: the only path to the model, over a pluggable
//!   [`Backend`](gateway::Backend) (OpenAI-compatible, Ollama, or mock).
//! - **[`Settings`](config::Settings)**: environment-driven configuration.
//!
//! ## Quick Start
//!
//! ```no_run
//! use medilens::{config::Settings, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let pipeline = Pipeline::new(settings.gateway()?);
//!
//!     let state = pipeline.run("chest_xray.jpg", "Rule out pneumonia", "").await?;
//!     println!("{}", state.final_report());
//!     for failure in state.failures() {
//!         eprintln!("{} degraded: {}", failure.stage, failure.message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod findings;
pub mod gateway;
pub mod imaging;
pub mod knowledge;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod stage;
pub mod state;

pub use config::{LlmConfig, Provider, Settings};
pub use error::{GatewayError, PipelineError, Result, ValidationError};
pub use findings::{AnatomicalRegion, Findings, ImageQuality, Modality};
pub use gateway::{BackoffConfig, InferenceGateway, MockBackend, OllamaBackend, OpenAiBackend};
pub use pipeline::{Pipeline, PipelineInput, PipelineProgress};
pub use stage::{StageError, StageOutput};
pub use state::{PipelineState, StageFailure, StageKind};

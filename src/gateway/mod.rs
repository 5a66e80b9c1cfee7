//! Inference gateway: the only way stages reach the external model.
//!
//! [`InferenceGateway`] owns the HTTP client, endpoint, model and sampling
//! configuration, and exposes a single operation, [`InferenceGateway::invoke`]:
//! a prompt (optionally with an image) in, response text out.
//!
//! ## Architecture
//!
//! ```text
//! Stage ──► InferenceGateway::invoke() ──► InferenceRequest ──► Backend::complete()
//!                                                                   │
//!                                                  ┌────────────────┼──────────────┐
//!                                             OpenAiBackend    OllamaBackend   MockBackend
//!                                         /v1/chat/completions   /api/chat     canned text
//! ```

pub mod backoff;
pub mod mock;
pub mod ollama;
pub mod openai;

pub use backoff::BackoffConfig;
pub use mock::MockBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use crate::config::LlmConfig;
use crate::error::GatewayError;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A base64-encoded image attached to an inference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Standard base64 of the raw file bytes.
    pub data: String,
    /// MIME type derived from the file extension (e.g. `image/png`).
    pub mime_type: &'static str,
}

impl ImagePayload {
    /// Render as a `data:` URL, the form OpenAI-style APIs expect.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// A normalized inference request, provider-agnostic.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Model identifier (e.g. `"gpt-4o"`, `"llava:13b"`).
    pub model: String,

    /// The user prompt text.
    pub prompt: String,

    /// Image sent alongside the prompt (analysis stage only).
    pub image: Option<ImagePayload>,

    /// Sampling configuration.
    pub config: LlmConfig,
}

/// A normalized inference response.
#[derive(Debug)]
pub struct InferenceResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, model info).
    pub metadata: Option<serde_json::Value>,
}

impl InferenceResponse {
    /// Tokens used by the call, from OpenAI `usage.total_tokens` or
    /// Ollama `prompt_eval_count + eval_count`.
    pub fn token_count(&self) -> Option<u64> {
        let meta = self.metadata.as_ref()?;
        if let Some(total) = meta.pointer("/usage/total_tokens").and_then(|v| v.as_u64()) {
            return Some(total);
        }
        let prompt = meta.get("prompt_eval_count").and_then(|v| v.as_u64());
        let eval = meta.get("eval_count").and_then(|v| v.as_u64());
        match (prompt, eval) {
            (None, None) => None,
            (p, e) => Some(p.unwrap_or(0) + e.unwrap_or(0)),
        }
    }
}

/// Abstraction over inference providers.
///
/// Implementors translate an [`InferenceRequest`] into the provider's HTTP
/// API and back. Designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a single, non-streaming call.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, GatewayError>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Check whether a [`GatewayError`] is retryable under the backoff config.
///
/// Retryable conditions:
/// - [`GatewayError::HttpError`] with a status in `config.retryable_statuses`
/// - [`GatewayError::Transport`] (connection/timeout errors)
pub fn is_retryable(error: &GatewayError, config: &BackoffConfig) -> bool {
    match error {
        GatewayError::HttpError { status, .. } => config.retryable_statuses.contains(status),
        GatewayError::Transport { .. } => true,
        _ => false,
    }
}

/// Execute a backend call with transport-level retry and exponential backoff.
///
/// With [`BackoffConfig::none()`] this is exactly one attempt. Returns the
/// first successful response, or the last error once retries are exhausted.
pub async fn with_backoff(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &InferenceRequest,
    config: &BackoffConfig,
) -> Result<InferenceResponse, GatewayError> {
    let mut attempt = 0;
    loop {
        match backend.complete(client, base_url, request).await {
            Ok(response) => return Ok(response),
            Err(e) if attempt < config.max_retries && is_retryable(&e, config) => {
                let delay = match &e {
                    GatewayError::HttpError {
                        retry_after: Some(ra),
                        ..
                    } if config.respect_retry_after => *ra,
                    _ => config.delay_for_attempt(attempt),
                };
                attempt += 1;
                warn!(
                    backend = backend.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = %e,
                    "retrying inference call"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Shared entry point to the external model.
///
/// Cheap to share across concurrent pipeline runs: the client is
/// reference-counted and nothing here is mutated after construction.
///
/// # Example
///
/// ```
/// use medilens::gateway::{InferenceGateway, MockBackend};
/// use std::sync::Arc;
///
/// let gateway = InferenceGateway::builder("http://unused")
///     .backend(Arc::new(MockBackend::fixed("ok")))
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// assert_eq!(gateway.model(), "gpt-4o");
/// ```
pub struct InferenceGateway {
    client: Client,
    base_url: String,
    backend: Arc<dyn Backend>,
    backoff: BackoffConfig,
    model: String,
    config: LlmConfig,
}

impl InferenceGateway {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> InferenceGatewayBuilder {
        InferenceGatewayBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            backoff: None,
            model: None,
            config: None,
            timeout: None,
        }
    }

    /// Send `prompt` (and optionally an image) and return the response text.
    pub async fn invoke(
        &self,
        prompt: impl Into<String>,
        image: Option<&ImagePayload>,
    ) -> Result<String, GatewayError> {
        let request = InferenceRequest {
            model: self.model.clone(),
            prompt: prompt.into(),
            image: image.cloned(),
            config: self.config.clone(),
        };
        debug!(
            backend = self.backend.name(),
            model = %request.model,
            prompt_chars = request.prompt.len(),
            has_image = request.image.is_some(),
            "invoking inference backend"
        );

        let response = with_backoff(
            &self.backend,
            &self.client,
            &self.base_url,
            &request,
            &self.backoff,
        )
        .await?;

        debug!(
            status = response.status,
            response_chars = response.text.len(),
            tokens = ?response.token_count(),
            metadata = ?response.metadata,
            "inference complete"
        );
        Ok(response.text)
    }

    /// The model every request is sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Name of the configured backend (`"openai"`, `"ollama"`, `"mock"`).
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// The sampling configuration sent with every request.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

impl std::fmt::Debug for InferenceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceGateway")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .finish()
    }
}

/// Builder for [`InferenceGateway`].
pub struct InferenceGatewayBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    backoff: Option<BackoffConfig>,
    model: Option<String>,
    config: Option<LlmConfig>,
    timeout: Option<Duration>,
}

impl InferenceGatewayBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the backend. Default: [`OpenAiBackend`] without a key.
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the transport retry configuration. Default: [`BackoffConfig::none()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Set the model. Default: `gpt-4o`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling configuration. Default: [`LlmConfig::default()`].
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the request timeout. Default: 120 seconds.
    ///
    /// Ignored when a custom `Client` is provided via `.client()`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the gateway.
    pub fn build(self) -> crate::error::Result<InferenceGateway> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(120)))
                .build()
                .map_err(|e| {
                    PipelineError::InvalidConfig(format!("failed to build HTTP client: {}", e))
                })?,
        };
        Ok(InferenceGateway {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(OpenAiBackend::new())),
            backoff: self.backoff.unwrap_or_default(),
            model: self.model.unwrap_or_else(|| "gpt-4o".to_string()),
            config: self.config.unwrap_or_default(),
        })
    }
}

/// Strip known provider path suffixes from a base URL.
/// e.g., "https://api.openai.com/v1" -> "https://api.openai.com"
/// e.g., "http://localhost:11434/api" -> "http://localhost:11434"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    for suffix in &["/v1/chat/completions", "/v1", "/api/chat", "/api"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

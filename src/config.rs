//! Explicit configuration for the inference service and the pipeline.
//!
//! Nothing in the crate reads the environment on its own: [`Settings`] is
//! loaded once (usually by the binary) and turned into an
//! [`InferenceGateway`] that is handed to the [`Pipeline`](crate::Pipeline).

use crate::gateway::{BackoffConfig, InferenceGateway, OllamaBackend, OpenAiBackend};
use crate::{error::Result, PipelineError};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Sampling configuration sent with every inference request.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }
}

/// Which inference provider the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI-compatible `/v1/chat/completions`.
    OpenAi,
    /// Ollama native `/api/chat`.
    Ollama,
}

impl Provider {
    fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com",
            Provider::Ollama => "http://localhost:11434",
        }
    }
}

impl FromStr for Provider {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown provider '{}' (expected 'openai' or 'ollama')",
                other
            ))),
        }
    }
}

/// Everything needed to reach the inference service and locate inputs.
#[derive(Clone)]
pub struct Settings {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub llm: LlmConfig,
    pub timeout: Duration,
    pub max_retries: u32,
    pub knowledge_base: PathBuf,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("llm", &self.llm)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("knowledge_base", &self.knowledge_base)
            .finish()
    }
}

impl Settings {
    /// Load settings from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("MEDILENS_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => Provider::OpenAi,
        };

        let settings = Self {
            provider,
            api_key: get("OPENAI_API_KEY"),
            base_url: get("MEDILENS_BASE_URL")
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            model: get("GPT_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
            llm: LlmConfig {
                temperature: parse_or("TEMPERATURE", get("TEMPERATURE"), 0.1)?,
                max_tokens: parse_or("MAX_TOKENS", get("MAX_TOKENS"), 1000)?,
            },
            timeout: Duration::from_secs(parse_or(
                "MEDILENS_TIMEOUT_SECS",
                get("MEDILENS_TIMEOUT_SECS"),
                120,
            )?),
            max_retries: parse_or("MEDILENS_MAX_RETRIES", get("MEDILENS_MAX_RETRIES"), 0)?,
            knowledge_base: get("KNOWLEDGE_BASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/medical_knowledge")),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check that required values are present and in range.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.provider == Provider::OpenAi && self.api_key.is_none() {
            errors.push("OPENAI_API_KEY is required for the openai provider".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push(format!(
                "TEMPERATURE must be within [0, 2], got {}",
                self.llm.temperature
            ));
        }
        if self.llm.max_tokens == 0 {
            errors.push("MAX_TOKENS must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::InvalidConfig(errors.join(", ")))
        }
    }

    /// Transport retry policy. Zero retries keeps single-attempt calls.
    pub fn backoff(&self) -> BackoffConfig {
        if self.max_retries == 0 {
            BackoffConfig::none()
        } else {
            BackoffConfig {
                max_retries: self.max_retries,
                ..BackoffConfig::standard()
            }
        }
    }

    /// Build the inference gateway described by these settings.
    pub fn gateway(&self) -> Result<InferenceGateway> {
        let builder = InferenceGateway::builder(&self.base_url)
            .model(&self.model)
            .config(self.llm.clone())
            .backoff(self.backoff())
            .timeout(self.timeout);

        let builder = match self.provider {
            Provider::OpenAi => {
                let mut backend = OpenAiBackend::new();
                if let Some(ref key) = self.api_key {
                    backend = backend.with_api_key(key);
                }
                builder.backend(Arc::new(backend))
            }
            Provider::Ollama => builder.backend(Arc::new(OllamaBackend)),
        };

        builder.build()
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|e| {
            PipelineError::InvalidConfig(format!("{} has invalid value '{}': {}", key, value, e))
        }),
    }
}

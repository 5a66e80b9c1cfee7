use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the pipeline and its components.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input image was rejected before any stage produced output.
    #[error("Invalid medical image: {0}")]
    Validation(#[from] ValidationError),

    /// A pipeline stage failed in a way the executor does not recover from.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem failure outside of image validation (context, reports).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

/// Reasons an image is not accepted for analysis.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The file could not be opened or read.
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file content does not look like any known image format.
    #[error("unrecognized image format: {0}")]
    UnknownFormat(PathBuf),

    /// Recognized, but not one of the formats the pipeline accepts.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The image header or pixel data failed to decode.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// Width or height outside the accepted bounds.
    #[error("image dimensions {width}x{height} outside accepted range")]
    Dimensions { width: u32, height: u32 },
}

/// Failures of a single call to the inference service.
///
/// Stages never propagate these: the executor turns them into degraded
/// stage output and keeps going.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Low-level transport failure (connection refused, timeout, etc.).
    #[error("Failed to connect to LLM at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider rejected the credentials (401/403).
    #[error("Authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// HTTP error with status code, response body, and optional Retry-After hint.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The provider answered with a body we could not read.
    #[error("Malformed LLM response: {0}")]
    Malformed(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Malformed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

//! Mock backend for running the pipeline without a live model.
//!
//! [`MockBackend`] returns canned responses by call number, can fail chosen
//! calls, and records every request it receives.
//!
//! # Example
//!
//! ```
//! use medilens::gateway::MockBackend;
//!
//! let mock = MockBackend::new(vec!["analysis".into(), "reasoning".into()])
//!     .failing_on(1, "reasoning service unavailable");
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, InferenceRequest, InferenceResponse};
use crate::error::GatewayError;

/// A test backend that returns canned responses in order.
///
/// Call `n` (0-based) answers with `responses[n % responses.len()]`, unless
/// it is configured to fail.
#[derive(Debug)]
pub struct MockBackend {
    responses: Vec<String>,
    index: AtomicUsize,
    failures: HashMap<usize, String>,
    transient_failures: usize,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl MockBackend {
    /// Create a mock backend with the given canned responses.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockBackend requires at least one response");
        Self {
            responses,
            index: AtomicUsize::new(0),
            failures: HashMap::new(),
            transient_failures: 0,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Make call number `call` fail with [`GatewayError::Other`] carrying `message`.
    pub fn failing_on(mut self, call: usize, message: impl Into<String>) -> Self {
        self.failures.insert(call, message.into());
        self
    }

    /// Make the first `count` calls fail with a retryable HTTP 503.
    pub fn with_transient_failures(mut self, count: usize) -> Self {
        self.transient_failures = count;
        self
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, GatewayError> {
        let call = self.index.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        if call < self.transient_failures {
            return Err(GatewayError::HttpError {
                status: 503,
                body: "temporarily unavailable".into(),
                retry_after: None,
            });
        }
        if let Some(message) = self.failures.get(&call) {
            return Err(GatewayError::Other(message.clone()));
        }

        Ok(InferenceResponse {
            text: self.responses[call % self.responses.len()].clone(),
            status: 200,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

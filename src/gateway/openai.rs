//! Backend for OpenAI-compatible chat completion APIs.
//!
//! Endpoint: `/v1/chat/completions`. Images travel as an `image_url` content
//! part holding a `data:` URL, which is what vision-capable models such as
//! `gpt-4o` accept.

use super::{Backend, InferenceRequest, InferenceResponse};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use medilens::gateway::OpenAiBackend;
///
/// let backend = OpenAiBackend::new().with_api_key("sk-...");
/// assert!(backend.has_api_key());
/// ```
#[derive(Clone)]
pub struct OpenAiBackend {
    /// Sent as `Authorization: Bearer {key}` when set.
    pub(crate) api_key: Option<String>,
    /// Sent as `OpenAI-Organization: {org}` when set.
    pub(crate) organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| {
                    if k.chars().count() > 6 {
                        format!("{}***", k.chars().take(6).collect::<String>())
                    } else {
                        "***".to_string()
                    }
                }),
            )
            .field("organization", &self.organization)
            .finish()
    }
}

impl OpenAiBackend {
    /// Create a backend without authentication.
    pub fn new() -> Self {
        Self {
            api_key: None,
            organization: None,
        }
    }

    /// Set the API key for authentication.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the organization ID header.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Returns `true` if an API key has been configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The single user message: plain text, or text plus image parts.
    fn build_user_message(request: &InferenceRequest) -> Value {
        match request.image {
            None => json!({"role": "user", "content": request.prompt}),
            Some(ref image) => json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": request.prompt},
                    {
                        "type": "image_url",
                        "image_url": {"url": image.data_url(), "detail": "high"}
                    }
                ]
            }),
        }
    }

    /// Build the request body for `/v1/chat/completions`.
    fn build_body(request: &InferenceRequest) -> Value {
        json!({
            "model": request.model,
            "messages": [Self::build_user_message(request)],
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
            "stream": false,
        })
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in ["usage", "model", "id"] {
            if let Some(v) = json_resp.get(key) {
                meta.insert(key.into(), v.clone());
            }
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

impl Default for OpenAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn a non-success response into the matching [`GatewayError`].
pub(crate) async fn error_from_response(resp: reqwest::Response) -> GatewayError {
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(std::time::Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();
    match status {
        401 | 403 => GatewayError::Auth { status, body },
        _ => GatewayError::HttpError {
            status,
            body,
            retry_after,
        },
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, GatewayError> {
        let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
        let body = Self::build_body(request);

        let mut req = client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(ref org) = self.organization {
            req = req.header("OpenAI-Organization", org.as_str());
        }

        let resp = req.send().await.map_err(|source| GatewayError::Transport {
            url: url.clone(),
            source,
        })?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }

        let status = resp.status().as_u16();
        let json_resp: Value = resp.json().await?;

        if let Some(message) = json_resp
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return Err(GatewayError::Other(message.to_string()));
        }

        let text = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                GatewayError::Malformed("missing choices[0].message.content".to_string())
            })?
            .trim()
            .to_string();

        Ok(InferenceResponse {
            text,
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::gateway::ImagePayload;

    fn test_request() -> InferenceRequest {
        InferenceRequest {
            model: "gpt-4o".into(),
            prompt: "Describe the image".into(),
            image: None,
            config: LlmConfig::default(),
        }
    }

    #[test]
    fn test_debug_masks_multibyte_key() {
        let backend = OpenAiBackend::new().with_api_key("ключ-секрет-123");
        let debug = format!("{:?}", backend);
        assert!(debug.contains("ключ-с***"));
        assert!(!debug.contains("секрет-123"));

        let short = format!("{:?}", OpenAiBackend::new().with_api_key("ключ"));
        assert!(short.contains("\"***\""));
        assert!(!short.contains("ключ"));
    }

    #[test]
    fn test_text_only_body() {
        let body = OpenAiBackend::build_body(&test_request());
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["stream"], false);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Describe the image");
    }

    #[test]
    fn test_vision_body_has_image_part() {
        let mut request = test_request();
        request.image = Some(ImagePayload {
            data: "iVBORw0K".into(),
            mime_type: "image/png",
        });
        let body = OpenAiBackend::build_body(&request);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "Describe the image");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/png;base64,iVBORw0K"
        );
        assert_eq!(content[1]["image_url"]["detail"], "high");
    }

    #[test]
    fn test_debug_masks_key() {
        let backend = OpenAiBackend::new().with_api_key("sk-abcdefghijkl");
        let dbg = format!("{:?}", backend);
        assert!(dbg.contains("sk-abc***"));
        assert!(!dbg.contains("ghijkl"));
    }

    #[test]
    fn test_metadata_extraction() {
        let resp = json!({"id": "chatcmpl-1", "model": "gpt-4o", "usage": {"total_tokens": 12}});
        let meta = OpenAiBackend::extract_metadata(&resp).unwrap();
        assert_eq!(meta["usage"]["total_tokens"], 12);
        assert!(OpenAiBackend::extract_metadata(&json!({})).is_none());
    }
}

//! Backend for Ollama's native chat API.
//!
//! Endpoint: `/api/chat`. Vision models (e.g. `llava`) take raw base64
//! images in the message's `images` array.

use super::openai::error_from_response;
use super::{Backend, InferenceRequest, InferenceResponse};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Backend for a local or remote Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaBackend;

impl OllamaBackend {
    fn build_body(request: &InferenceRequest) -> Value {
        let mut message = json!({"role": "user", "content": request.prompt});
        if let Some(ref image) = request.image {
            message["images"] = json!([image.data]);
        }

        json!({
            "model": request.model,
            "messages": [message],
            "stream": false,
            "options": {
                "temperature": request.config.temperature,
                "num_predict": request.config.max_tokens,
            },
        })
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in [
            "total_duration",
            "eval_count",
            "eval_duration",
            "prompt_eval_count",
            "model",
        ] {
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

#[async_trait]
impl Backend for OllamaBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, GatewayError> {
        let url = format!("{}/api/chat", base_url.trim_end_matches('/'));
        let body = Self::build_body(request);

        let resp = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                url: url.clone(),
                source,
            })?;

        if !resp.status().is_success() {
            return Err(error_from_response(resp).await);
        }

        let status = resp.status().as_u16();
        let json_resp: Value = resp.json().await?;

        if let Some(err) = json_resp.get("error").and_then(|e| e.as_str()) {
            return Err(GatewayError::Other(err.to_string()));
        }

        let text = json_resp
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::Malformed("missing message.content".to_string()))?
            .trim()
            .to_string();

        Ok(InferenceResponse {
            text,
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::gateway::ImagePayload;

    fn test_request() -> InferenceRequest {
        InferenceRequest {
            model: "llava:13b".into(),
            prompt: "Analyze".into(),
            image: None,
            config: LlmConfig::default().with_temperature(0.2),
        }
    }

    #[test]
    fn test_chat_body_text_only() {
        let body = OllamaBackend::build_body(&test_request());
        assert_eq!(body["model"], "llava:13b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.2);
        assert_eq!(body["options"]["num_predict"], 1000);
        assert_eq!(body["messages"][0]["content"], "Analyze");
        assert!(body["messages"][0].get("images").is_none());
    }

    #[test]
    fn test_chat_body_with_image() {
        let mut request = test_request();
        request.image = Some(ImagePayload {
            data: "/9j/4AAQ".into(),
            mime_type: "image/jpeg",
        });
        let body = OllamaBackend::build_body(&request);
        let images = body["messages"][0]["images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0], "/9j/4AAQ");
    }

    #[test]
    fn test_metadata_extraction() {
        let resp = json!({"model": "llava", "eval_count": 42, "done": true});
        let meta = OllamaBackend::extract_metadata(&resp).unwrap();
        assert_eq!(meta["eval_count"], 42);
        assert!(meta.get("done").is_none());
    }
}

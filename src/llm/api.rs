// file: src/llm/api.rs
// description: typed chat-completion API boundary and reqwest implementation
// reference: https://console.groq.com/docs/api-reference#chat

use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// What the gateway sends upstream for one attempt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt_text: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// Validated completion, parsed from the provider response immediately at
/// the network boundary. No untyped JSON escapes this module.
#[derive(Debug, Clone)]
pub struct RawCompletion {
    pub text: String,
    pub finish_reason: Option<String>,
}

/// Attempt-level failure classification driving the gateway's retry policy.
#[derive(Debug, Clone)]
pub enum ApiFailure {
    /// Timeout, connection failure, 429 or 5xx: worth retrying.
    Transient(String),
    /// 4xx client error: the request itself is wrong, retrying cannot help.
    Fatal { status: u16, message: String },
}

pub type ApiResult = std::result::Result<RawCompletion, ApiFailure>;

/// Seam for the remote completion model, kept narrow so tests can substitute
/// a scripted implementation.
pub trait CompletionApi: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> impl Future<Output = ApiResult> + Send;
}

/// Lets callers share one api instance (e.g. to keep a handle on it after
/// the orchestrator takes ownership) by wrapping it in an `Arc`.
impl<T: CompletionApi> CompletionApi for std::sync::Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> ApiResult {
        self.as_ref().complete(request).await
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug)]
pub struct HttpCompletionApi {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpCompletionApi {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RagError::Config("llm api_key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

impl CompletionApi for HttpCompletionApi {
    async fn complete(&self, request: &CompletionRequest) -> ApiResult {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt_text,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!("Sending completion request to {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiFailure::Transient(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());

            return if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                Err(ApiFailure::Transient(format!("{}: {}", status, message)))
            } else {
                Err(ApiFailure::Fatal {
                    status: status.as_u16(),
                    message,
                })
            };
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ApiFailure::Transient(format!("invalid completion response: {}", e)))?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            ApiFailure::Transient("completion response contained no choices".to_string())
        })?;

        Ok(RawCompletion {
            text: choice.message.content,
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = Config::default_config();
        let err = HttpCompletionApi::new(&config.llm).unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_response_shape_parses() {
        let raw = r#"{
            "choices": [
                {
                    "message": {"role": "assistant", "content": "An answer [S1]."},
                    "finish_reason": "stop"
                }
            ]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "An answer [S1].");
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}

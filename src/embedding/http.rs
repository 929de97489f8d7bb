// file: src/embedding/http.rs
// description: remote embedding client for OpenAI-compatible endpoints
// reference: https://console.groq.com/docs/embeddings

use crate::config::EmbeddingConfig;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug)]
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RagError::Config("embedding api_key is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RagError::Embedding(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            dimension: config.dimension,
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            input: inputs,
            model: &self.model,
        };

        debug!("Requesting {} embeddings from {}", inputs.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RagError::Embedding(format!(
                "embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("invalid embedding response: {}", e)))?;

        if parsed.data.len() != inputs.len() {
            return Err(RagError::Embedding(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(RagError::Embedding(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }

        Ok(vectors)
    }
}

impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn version(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::Embedding("cannot embed empty text".to_string()));
        }

        let inputs = [text.to_string()];
        let mut vectors = self.request(&inputs).await?;
        Ok(vectors.remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(blank) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(RagError::Embedding(format!(
                "cannot embed empty text at batch position {}",
                blank
            )));
        }

        self.request(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(api_key: Option<String>) -> EmbeddingConfig {
        EmbeddingConfig {
            endpoint: "https://example.invalid/v1/embeddings".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key,
            dimension: 384,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = HttpEmbedder::new(&test_config(None)).unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_version_is_model_name() {
        let embedder = HttpEmbedder::new(&test_config(Some("key".to_string()))).unwrap();
        assert_eq!(embedder.version(), "text-embedding-3-small");
        assert_eq!(embedder.dimension(), 384);
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_network() {
        let embedder = HttpEmbedder::new(&test_config(Some("key".to_string()))).unwrap();
        let err = embedder.embed("").await.unwrap_err();
        assert_eq!(err.code(), "EMBEDDING");
    }
}

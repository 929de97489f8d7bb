// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{RagError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub llm: LlmConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    pub k: usize,
    pub similarity_threshold: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    pub token_budget: usize,
    pub max_history_exchanges: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub max_retries: usize,
    pub max_concurrent: usize,
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub snapshot_path: Option<PathBuf>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RESEARCHMATE")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| RagError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            chunking: ChunkingConfig {
                chunk_size: 1000,
                chunk_overlap: 200,
            },
            embedding: EmbeddingConfig {
                endpoint: "https://api.openai.com/v1/embeddings".to_string(),
                model: "text-embedding-3-small".to_string(),
                api_key: None,
                dimension: 384,
                timeout_seconds: 30,
            },
            retrieval: RetrievalConfig {
                k: 5,
                similarity_threshold: 0.25,
            },
            context: ContextConfig {
                token_budget: 4000,
                max_history_exchanges: 6,
            },
            llm: LlmConfig {
                endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
                model: "llama-3.3-70b-versatile".to_string(),
                api_key: None,
                max_tokens: 1024,
                temperature: 0.7,
                timeout_seconds: 60,
                max_retries: 3,
                max_concurrent: 4,
                queue_depth: 32,
            },
            store: StoreConfig {
                snapshot_path: Some(PathBuf::from("data/snapshot.json")),
            },
        }
    }

    /// Fatal at startup; a rejected config is never retried.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.chunking.chunk_overlap == 0 {
            return Err(RagError::Config(
                "chunk_overlap must be greater than 0".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.embedding.dimension == 0 {
            return Err(RagError::Config(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        if self.retrieval.k == 0 {
            return Err(RagError::Config("retrieval k must be at least 1".to_string()));
        }

        if !(0.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return Err(RagError::Config(format!(
                "similarity_threshold must be in [0.0, 1.0], got {}",
                self.retrieval.similarity_threshold
            )));
        }

        if self.context.token_budget == 0 {
            return Err(RagError::Config(
                "context token_budget must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_concurrent == 0 {
            return Err(RagError::Config(
                "llm max_concurrent must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(RagError::Config(format!(
                "llm temperature must be in [0.0, 2.0], got {}",
                self.llm.temperature
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default_config();
        config.chunking.chunk_overlap = config.chunking.chunk_size;

        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = Config::default_config();
        config.chunking.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_overlap_rejected() {
        let mut config = Config::default_config();
        config.chunking.chunk_overlap = 0;

        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CONFIG");
    }

    #[test]
    fn test_zero_k_rejected() {
        let mut config = Config::default_config();
        config.retrieval.k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = Config::default_config();
        config.retrieval.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}

// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod chunker;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod retriever;
pub mod store;
pub mod utils;

pub use chunker::{ChunkSegment, Chunker};
pub use config::{
    ChunkingConfig, Config, ContextConfig, EmbeddingConfig, LlmConfig, RetrievalConfig,
    StoreConfig,
};
pub use context::{ContextAssembler, ContextBlock, Prompt, SourcedChunk};
pub use embedding::{Embedder, HashEmbedder, HttpEmbedder};
pub use error::{RagError, Result};
pub use llm::{CompletionApi, HttpCompletionApi, LlmGateway, RawCompletion};
pub use models::{Answer, Chunk, Citation, Document, QaExchange, estimate_tokens};
pub use pipeline::{
    AskResponse, IngestMetadata, IngestReceipt, Orchestrator, PaperSummary, ReadinessGate,
    ReadinessState, Stage,
};
pub use retriever::Retriever;
pub use store::{MemoryVectorStore, ScopeFilter, ScoredChunk, StoreStats, cosine_similarity};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let config = Config::default_config();
        let _chunker = Chunker::new(&config.chunking).unwrap();
        let _store = MemoryVectorStore::new(config.embedding.dimension, "test-model");
    }
}

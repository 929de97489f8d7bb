// file: src/models/chunk.rs
// description: retrieval unit carrying text, embedding and provenance
// reference: internal data structures

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rough token estimate: one token per four characters, rounded up. Keeps
/// the budget arithmetic provider-agnostic without a tokenizer dependency.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// A bounded segment of a document's text, the unit of similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub text: String,
    pub position_index: usize,
    pub embedding: Vec<f32>,
    pub embedding_version: String,
    pub token_count: usize,
}

impl Chunk {
    pub fn new(
        document_id: Uuid,
        text: String,
        position_index: usize,
        embedding: Vec<f32>,
        embedding_version: String,
    ) -> Self {
        let token_count = estimate_tokens(&text);

        Self {
            id: Uuid::new_v4(),
            document_id,
            text,
            position_index,
            embedding,
            embedding_version,
            token_count,
        }
    }
}

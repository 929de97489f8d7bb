// file: src/retriever/mod.rs
// description: similarity retrieval with score threshold and adjacency dedup
// reference: embeds the query, delegates to the vector store

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::{MemoryVectorStore, ScopeFilter, ScoredChunk};
use std::sync::Arc;
use tracing::debug;

pub struct Retriever<E: Embedder> {
    embedder: Arc<E>,
    store: Arc<MemoryVectorStore>,
    config: RetrievalConfig,
}

impl<E: Embedder> Retriever<E> {
    pub fn new(embedder: Arc<E>, store: Arc<MemoryVectorStore>, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }

    /// Embed `query` and return the top-k chunks above the similarity
    /// threshold. An empty result is a recognized outcome, not an error.
    pub async fn retrieve(&self, query: &str, scope: &ScopeFilter) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embedder.embed(query).await?;
        self.retrieve_embedded(&embedding, scope).await
    }

    /// Retrieval for callers that already hold the query embedding.
    pub async fn retrieve_embedded(
        &self,
        embedding: &[f32],
        scope: &ScopeFilter,
    ) -> Result<Vec<ScoredChunk>> {
        // Over-fetch so that threshold filtering and dedup still leave k.
        let fetch = self.config.k.saturating_mul(2).max(self.config.k);
        let candidates = self.store.query(embedding, fetch, scope).await?;

        let total = candidates.len();
        let above_threshold: Vec<ScoredChunk> = candidates
            .into_iter()
            .filter(|scored| scored.score >= self.config.similarity_threshold)
            .collect();

        let deduped = dedup_adjacent(above_threshold);

        debug!(
            candidates = total,
            kept = deduped.len(),
            threshold = self.config.similarity_threshold,
            "Retrieval complete"
        );

        Ok(deduped.into_iter().take(self.config.k).collect())
    }
}

/// Drop the lower-scoring of two chunks from the same document whose
/// positions differ by one; their text overlaps and would waste budget.
fn dedup_adjacent(scored: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut kept: Vec<ScoredChunk> = Vec::with_capacity(scored.len());

    // Input is score-descending, so earlier entries always win.
    for candidate in scored {
        let redundant = kept.iter().any(|existing| {
            existing.chunk.document_id == candidate.chunk.document_id
                && existing.chunk.position_index.abs_diff(candidate.chunk.position_index) == 1
        });
        if !redundant {
            kept.push(candidate);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::{Chunk, Document};
    use uuid::Uuid;

    fn scored(document_id: Uuid, position: usize, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(
                document_id,
                format!("chunk {}", position),
                position,
                vec![1.0, 0.0],
                "test-model".to_string(),
            ),
            score,
        }
    }

    #[test]
    fn test_dedup_keeps_higher_scoring_neighbor() {
        let doc = Uuid::new_v4();
        let result = dedup_adjacent(vec![
            scored(doc, 3, 0.9),
            scored(doc, 4, 0.8),
            scored(doc, 7, 0.7),
        ]);

        let positions: Vec<usize> = result.iter().map(|s| s.chunk.position_index).collect();
        assert_eq!(positions, vec![3, 7]);
    }

    #[test]
    fn test_dedup_ignores_other_documents() {
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        let result = dedup_adjacent(vec![scored(doc_a, 3, 0.9), scored(doc_b, 4, 0.8)]);
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_threshold_can_empty_the_result() {
        let embedder = Arc::new(HashEmbedder::new(32));
        let store = Arc::new(MemoryVectorStore::new(32, embedder.version()));

        let doc = Document::new(
            "completely unrelated material".to_string(),
            "Doc".to_string(),
            String::new(),
            None,
            None,
        );
        let embedding = embedder.embed("completely unrelated material").await.unwrap();
        let chunk = Chunk::new(
            doc.id,
            "completely unrelated material".to_string(),
            0,
            embedding,
            embedder.version().to_string(),
        );
        store.upsert_document(doc, vec![chunk]).await.unwrap();

        let retriever = Retriever::new(
            embedder,
            store,
            RetrievalConfig {
                k: 5,
                similarity_threshold: 0.99,
            },
        );

        let results = retriever
            .retrieve("quantum chromodynamics", &ScopeFilter::default())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_returns_relevant_chunk() {
        let embedder = Arc::new(HashEmbedder::new(64));
        let store = Arc::new(MemoryVectorStore::new(64, embedder.version()));

        let doc = Document::new(
            "transformers use attention".to_string(),
            "Doc".to_string(),
            String::new(),
            None,
            None,
        );
        let embedding = embedder.embed("transformers use attention").await.unwrap();
        let chunk = Chunk::new(
            doc.id,
            "transformers use attention".to_string(),
            0,
            embedding,
            embedder.version().to_string(),
        );
        store.upsert_document(doc, vec![chunk]).await.unwrap();

        let retriever = Retriever::new(
            embedder,
            store,
            RetrievalConfig {
                k: 3,
                similarity_threshold: 0.1,
            },
        );

        let results = retriever
            .retrieve("transformers attention", &ScopeFilter::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score > 0.1);
    }
}

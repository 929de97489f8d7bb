// file: src/store/memory.rs
// description: in-memory vector index with cosine search and JSON snapshots
// reference: shared-state concurrency with tokio::sync::RwLock

use crate::error::{RagError, Result};
use crate::models::{Chunk, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Restricts a similarity search to one project and/or one document.
#[derive(Debug, Clone, Default)]
pub struct ScopeFilter {
    pub project_id: Option<String>,
    pub document_id: Option<Uuid>,
}

/// A chunk paired with its similarity to the query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub embedding_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    chunk: Chunk,
    seq: u64,
}

#[derive(Default, Serialize, Deserialize)]
struct StoreInner {
    documents: HashMap<Uuid, Document>,
    chunks: Vec<StoredChunk>,
    next_seq: u64,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    embedding_version: String,
    dimension: usize,
    inner: StoreInner,
}

/// Vector index shared across requests. A single `RwLock` serializes
/// writers, so one `upsert_document` is observed atomically by any
/// concurrent `query` and same-document upsert/delete never interleave.
pub struct MemoryVectorStore {
    dimension: usize,
    embedding_version: String,
    inner: RwLock<StoreInner>,
}

impl MemoryVectorStore {
    pub fn new(dimension: usize, embedding_version: impl Into<String>) -> Self {
        Self {
            dimension,
            embedding_version: embedding_version.into(),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedding_version(&self) -> &str {
        &self.embedding_version
    }

    fn check_chunk(&self, chunk: &Chunk) -> Result<()> {
        if chunk.embedding.len() != self.dimension {
            return Err(RagError::Store(format!(
                "chunk {} has embedding dimension {}, store expects {}",
                chunk.id,
                chunk.embedding.len(),
                self.dimension
            )));
        }
        if chunk.embedding_version != self.embedding_version {
            return Err(RagError::Store(format!(
                "chunk {} was embedded with '{}', store holds '{}' vectors",
                chunk.id, chunk.embedding_version, self.embedding_version
            )));
        }
        Ok(())
    }

    /// Insert a document and all of its chunks in one atomic step. A prior
    /// document with the same id or the same content hash is replaced,
    /// chunks included, so re-ingestion never duplicates.
    pub async fn upsert_document(&self, document: Document, chunks: Vec<Chunk>) -> Result<()> {
        for chunk in &chunks {
            self.check_chunk(chunk)?;
            if chunk.document_id != document.id {
                return Err(RagError::Store(format!(
                    "chunk {} does not belong to document {}",
                    chunk.id, document.id
                )));
            }
        }

        let mut inner = self.inner.write().await;

        let stale: Vec<Uuid> = inner
            .documents
            .values()
            .filter(|d| d.id == document.id || d.content_hash == document.content_hash)
            .map(|d| d.id)
            .collect();
        for id in stale {
            inner.documents.remove(&id);
            inner.chunks.retain(|stored| stored.chunk.document_id != id);
        }

        debug!(
            document_id = %document.id,
            chunk_count = chunks.len(),
            "Upserting document"
        );

        inner.documents.insert(document.id, document);
        for chunk in chunks {
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.chunks.push(StoredChunk { chunk, seq });
        }

        Ok(())
    }

    /// Idempotent by chunk id: re-upserting replaces vector and text while
    /// keeping the original insertion rank for tie-breaking.
    pub async fn upsert_chunks(&self, chunks: Vec<Chunk>) -> Result<()> {
        for chunk in &chunks {
            self.check_chunk(chunk)?;
        }

        let mut inner = self.inner.write().await;
        for chunk in chunks {
            if let Some(existing) = inner
                .chunks
                .iter_mut()
                .find(|stored| stored.chunk.id == chunk.id)
            {
                existing.chunk = chunk;
            } else {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.chunks.push(StoredChunk { chunk, seq });
            }
        }

        Ok(())
    }

    /// Top-k cosine similarity search, descending; ties resolve by insertion
    /// order. Fewer than `k` matches returns the matching subset.
    pub async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &ScopeFilter,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::Store("query k must be at least 1".to_string()));
        }
        if embedding.len() != self.dimension {
            return Err(RagError::Store(format!(
                "query embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dimension
            )));
        }

        let inner = self.inner.read().await;

        let mut scored: Vec<(f32, u64, &StoredChunk)> = inner
            .chunks
            .iter()
            .filter(|stored| {
                if let Some(document_id) = filter.document_id {
                    if stored.chunk.document_id != document_id {
                        return false;
                    }
                }
                if let Some(project_id) = &filter.project_id {
                    match inner.documents.get(&stored.chunk.document_id) {
                        Some(doc) => doc.project_id.as_deref() == Some(project_id.as_str()),
                        None => false,
                    }
                } else {
                    true
                }
            })
            .map(|stored| {
                let score = cosine_similarity(embedding, &stored.chunk.embedding);
                (score, stored.seq, stored)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, _, stored)| ScoredChunk {
                chunk: stored.chunk.clone(),
                score,
            })
            .collect())
    }

    /// Cascades to all child chunks. Deleting an unknown id is a no-op.
    pub async fn delete_document(&self, document_id: Uuid) {
        let mut inner = self.inner.write().await;
        inner.documents.remove(&document_id);
        inner
            .chunks
            .retain(|stored| stored.chunk.document_id != document_id);
    }

    pub async fn document(&self, document_id: Uuid) -> Option<Document> {
        self.inner.read().await.documents.get(&document_id).cloned()
    }

    pub async fn find_by_hash(&self, content_hash: &str) -> Option<Uuid> {
        self.inner
            .read()
            .await
            .documents
            .values()
            .find(|d| d.content_hash == content_hash)
            .map(|d| d.id)
    }

    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        StoreStats {
            documents: inner.documents.len(),
            chunks: inner.chunks.len(),
            dimension: self.dimension,
            embedding_version: self.embedding_version.clone(),
        }
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        *inner = StoreInner::default();
    }

    /// Write a versioned JSON snapshot so the index survives restarts.
    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        let inner = self.inner.read().await;
        let snapshot = Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            embedding_version: self.embedding_version.clone(),
            dimension: self.dimension,
            inner: StoreInner {
                documents: inner.documents.clone(),
                chunks: inner.chunks.clone(),
                next_seq: inner.next_seq,
            },
        };
        drop(inner);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(&snapshot)?;
        tokio::fs::write(path, data).await?;
        debug!("Saved store snapshot to {}", path.display());
        Ok(())
    }

    /// Load a snapshot if present and compatible. A snapshot produced by a
    /// different embedder version or dimension is stale and is discarded
    /// rather than mixed into the live index. Returns whether data loaded.
    pub async fn load_snapshot(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }

        let data = tokio::fs::read_to_string(path).await?;
        let snapshot: Snapshot = serde_json::from_str(&data)?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            warn!(
                "Snapshot format {} is not supported, ignoring {}",
                snapshot.format_version,
                path.display()
            );
            return Ok(false);
        }

        if snapshot.embedding_version != self.embedding_version
            || snapshot.dimension != self.dimension
        {
            warn!(
                "Snapshot was built with embedder '{}' (dim {}), current is '{}' (dim {}); documents must be re-ingested",
                snapshot.embedding_version,
                snapshot.dimension,
                self.embedding_version,
                self.dimension
            );
            return Ok(false);
        }

        let mut inner = self.inner.write().await;
        *inner = snapshot.inner;
        info!(
            "Loaded {} chunks across {} documents from snapshot",
            inner.chunks.len(),
            inner.documents.len()
        );
        Ok(true)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

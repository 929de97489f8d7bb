// file: src/embedding/mod.rs
// description: embedding provider trait and implementations
// reference: internal module structure

pub mod hash;
pub mod http;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;

use crate::error::Result;

/// Maps text to fixed-dimension vectors for ingestion and queries. The
/// `version` tag travels with every stored vector so a model change is
/// detectable instead of silently corrupting similarity search.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Identifies the model that produced the vectors, e.g. its name.
    fn version(&self) -> &str;

    /// Embed a single text. Empty input is an `EMBEDDING` error; callers
    /// filter blanks before reaching this point.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;

    /// Embed a batch, order-preserving, same length as input. All-or-nothing:
    /// one failure fails the whole batch so document ingestion stays atomic.
    fn embed_batch(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;
}

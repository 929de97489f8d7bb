// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod answer;
pub mod chunk;
pub mod document;

pub use answer::{Answer, Citation, QaExchange};
pub use chunk::{Chunk, estimate_tokens};
pub use document::Document;

// file: src/chunker/mod.rs
// description: deterministic overlapping text chunker with boundary preference
// reference: splits on sentence/paragraph boundaries, falls back to hard cuts

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};

/// A chunk of source text before embedding: the text itself plus where it
/// came from in the parent document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSegment {
    pub text: String,
    pub start_offset: usize,
    pub position_index: usize,
}

pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if config.chunk_overlap == 0 {
            return Err(RagError::Config(
                "chunk_overlap must be greater than 0".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        })
    }

    /// Split `text` into overlapping segments. Same input always produces the
    /// same segments, which keeps re-ingestion idempotent. Whitespace-only
    /// input yields zero segments.
    pub fn chunk(&self, text: &str) -> Vec<ChunkSegment> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        if text.len() <= self.chunk_size {
            return vec![ChunkSegment {
                text: text.to_string(),
                start_offset: 0,
                position_index: 0,
            }];
        }

        let mut segments = Vec::new();
        let mut start = 0usize;
        let mut position_index = 0usize;

        while start < text.len() {
            let hard_end = floor_char_boundary(text, (start + self.chunk_size).min(text.len()));
            let end = if hard_end < text.len() {
                self.find_break(text, start, hard_end)
            } else {
                hard_end
            };

            let piece = text[start..end].trim();
            if !piece.is_empty() {
                segments.push(ChunkSegment {
                    text: piece.to_string(),
                    start_offset: start,
                    position_index,
                });
                position_index += 1;
            }

            if end >= text.len() {
                break;
            }

            // Step back by the overlap, but always move forward to terminate.
            let next = end.saturating_sub(self.overlap).max(start + 1);
            start = ceil_char_boundary(text, next);
        }

        segments
    }

    /// Prefer a sentence end, then a paragraph break, then any line break
    /// within the window; otherwise cut hard at the size limit.
    fn find_break(&self, text: &str, start: usize, hard_end: usize) -> usize {
        let window = &text[start..hard_end];

        if let Some(pos) = window.rfind('.') {
            if pos > 0 {
                return start + pos + 1;
            }
        }

        if let Some(pos) = window.rfind("\n\n") {
            if pos > 0 {
                return start + pos + 2;
            }
        }

        if let Some(pos) = window.rfind('\n') {
            if pos > 0 {
                return start + pos + 1;
            }
        }

        hard_end
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(&ChunkingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        let result = Chunker::new(&ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        });
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[test]
    fn test_zero_overlap_rejected() {
        let result = Chunker::new(&ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 0,
        });
        assert!(matches!(result, Err(RagError::Config(_))));
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = chunker(100, 20);
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t  ").is_empty());
    }

    #[test]
    fn test_short_input_is_single_chunk() {
        let chunker = chunker(100, 20);
        let segments = chunker.chunk("short text");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "short text");
        assert_eq!(segments[0].position_index, 0);
    }

    #[test]
    fn test_hard_cut_stride_matches_size_minus_overlap() {
        // 3000 chars with no break characters: starts advance by 800.
        let text = "a".repeat(3000);
        let chunker = chunker(1000, 200);
        let segments = chunker.chunk(&text);

        assert_eq!(segments.len(), 4);
        let starts: Vec<usize> = segments.iter().map(|s| s.start_offset).collect();
        assert_eq!(starts, vec![0, 800, 1600, 2400]);
        assert_eq!(segments[3].text.len(), 600);
        assert!(segments.iter().all(|s| s.text.len() <= 1000));
    }

    #[test]
    fn test_deterministic() {
        let text = "First sentence. Second sentence. Third sentence. ".repeat(40);
        let chunker = chunker(200, 50);
        let a = chunker.chunk(&text);
        let b = chunker.chunk(&text);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prefers_sentence_boundary() {
        let text = format!("{}. {}", "x".repeat(50), "y".repeat(100));
        let chunker = chunker(80, 10);
        let segments = chunker.chunk(&text);
        assert!(segments[0].text.ends_with('.'));
    }

    #[test]
    fn test_position_indexes_are_contiguous() {
        let text = "word ".repeat(500);
        let chunker = chunker(120, 30);
        let segments = chunker.chunk(&text);
        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.position_index, i);
        }
    }

    #[test]
    fn test_multibyte_input_does_not_panic() {
        let text = "héllo wörld. ".repeat(200);
        let chunker = chunker(64, 16);
        let segments = chunker.chunk(&text);
        assert!(!segments.is_empty());
    }
}

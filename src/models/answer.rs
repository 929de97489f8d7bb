// file: src/models/answer.rs
// description: generated answer, citation and conversation history models
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A grounded answer produced by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub cited_chunk_ids: HashSet<Uuid>,
    pub generated_at: DateTime<Utc>,
    /// Set when retrieval found nothing above the similarity threshold and
    /// the model answered without supporting documents.
    pub no_context: bool,
}

impl Answer {
    pub fn new(text: String, cited_chunk_ids: HashSet<Uuid>, no_context: bool) -> Self {
        Self {
            text,
            cited_chunk_ids,
            generated_at: Utc::now(),
            no_context,
        }
    }
}

/// Source attribution surfaced to the caller alongside the answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub source_uri: Option<String>,
}

/// One prior question/answer turn, threaded back in for follow-up questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaExchange {
    pub question: String,
    pub answer: String,
}

impl QaExchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_flags() {
        let answer = Answer::new("text".to_string(), HashSet::new(), true);
        assert!(answer.no_context);
        assert!(answer.cited_chunk_ids.is_empty());
    }

    #[test]
    fn test_citation_equality() {
        let a = Citation {
            title: "Paper".to_string(),
            source_uri: None,
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}

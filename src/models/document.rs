// file: src/models/document.rs
// description: core document model with content hashing
// reference: internal data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An ingested paper. Immutable once stored; re-ingesting the same content
/// replaces the prior version wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_uri: Option<String>,
    pub project_id: Option<String>,
    pub title: String,
    pub abstract_text: String,
    pub raw_text: String,
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        raw_text: String,
        title: String,
        abstract_text: String,
        source_uri: Option<String>,
        project_id: Option<String>,
    ) -> Self {
        let content_hash = Self::compute_hash(&raw_text);

        Self {
            id: Uuid::new_v4(),
            source_uri,
            project_id,
            title,
            abstract_text,
            raw_text,
            content_hash,
            uploaded_at: Utc::now(),
        }
    }

    pub fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_creation() {
        let doc = Document::new(
            "Some paper text".to_string(),
            "A Paper".to_string(),
            "An abstract".to_string(),
            Some("https://example.org/paper.pdf".to_string()),
            None,
        );

        assert_eq!(doc.title, "A Paper");
        assert!(!doc.content_hash.is_empty());
        assert!(doc.project_id.is_none());
    }

    #[test]
    fn test_hash_consistency() {
        let content = "Test content";
        let hash1 = Document::compute_hash(content);
        let hash2 = Document::compute_hash(content);
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_differs_for_different_content() {
        assert_ne!(
            Document::compute_hash("alpha"),
            Document::compute_hash("beta")
        );
    }
}

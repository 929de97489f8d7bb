// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error(
        "Context budget of {budget_tokens} tokens is below the {minimal_tokens} tokens the prompt requires"
    )]
    ContextOverflow {
        budget_tokens: usize,
        minimal_tokens: usize,
    },

    #[error("Completion endpoint unavailable after {attempts} attempts: {message}")]
    UpstreamUnavailable { attempts: usize, message: String },

    #[error("Completion request rejected ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    #[error("Too many queued completion requests, try again shortly")]
    Backpressure,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagError {
    /// Stable, user-facing error code. The web layer maps these to response
    /// categories, never raw error chains.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Config(_) => "CONFIG",
            RagError::Embedding(_) => "EMBEDDING",
            RagError::Store(_) => "STORE",
            RagError::ContextOverflow { .. } => "CONTEXT_OVERFLOW",
            RagError::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            RagError::UpstreamRejected { .. } => "UPSTREAM_REJECTED",
            RagError::Backpressure => "BACKPRESSURE",
            RagError::Io(_) => "IO",
            RagError::Serialization(_) => "SERIALIZATION",
        }
    }

    /// Whether the caller may reasonably retry the request as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::UpstreamUnavailable { .. } | RagError::Backpressure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(RagError::Config("bad".into()).code(), "CONFIG");
        assert_eq!(RagError::Backpressure.code(), "BACKPRESSURE");
        assert_eq!(
            RagError::ContextOverflow {
                budget_tokens: 10,
                minimal_tokens: 50
            }
            .code(),
            "CONTEXT_OVERFLOW"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(
            RagError::UpstreamUnavailable {
                attempts: 3,
                message: "503".into()
            }
            .is_retryable()
        );
        assert!(RagError::Backpressure.is_retryable());
        assert!(!RagError::Config("bad".into()).is_retryable());
        assert!(
            !RagError::UpstreamRejected {
                status: 400,
                message: "bad request".into()
            }
            .is_retryable()
        );
    }
}

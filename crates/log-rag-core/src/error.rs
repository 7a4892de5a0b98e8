//! Error types for the retrieval and answer pipeline.
//!
//! Malformed log lines are not errors: they are reported as
//! [`ParseWarning`](crate::parse::ParseWarning)s and recovered by the
//! ingestor. A query that matches nothing is not an error either; it
//! produces an [`Answer`](crate::models::Answer) with no source entries.

use thiserror::Error;

/// Errors returned by [`VectorStoreAdapter`](crate::adapter::VectorStoreAdapter)
/// and [`QueryPipeline`](crate::pipeline::QueryPipeline).
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding or language-model backend could not serve the request.
    #[error("{service} service unavailable: {message}")]
    ServiceUnavailable {
        service: &'static str,
        message: String,
    },
    /// The vector store rejected an operation.
    #[error("vector store error: {0}")]
    Store(String),
    /// A time filter bound could not be parsed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

impl RagError {
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        RagError::ServiceUnavailable {
            service: "embedding",
            message: err.to_string(),
        }
    }

    pub fn language_model(err: impl std::fmt::Display) -> Self {
        RagError::ServiceUnavailable {
            service: "language model",
            message: err.to_string(),
        }
    }

    /// Wrap a backend error, keeping its full context chain.
    pub fn store(err: anyhow::Error) -> Self {
        RagError::Store(format!("{:#}", err))
    }

    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, RagError::ServiceUnavailable { .. })
    }
}

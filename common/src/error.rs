use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Invalid configuration: {0}")]
    Validation(String),
    #[error("Vector store error: {0}")]
    VectorStore(String),
    #[error("Graph store error: {0}")]
    GraphStore(String),
    #[error("Entity extraction error: {0}")]
    EntityExtraction(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Backend error: {0}")]
    Backend(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl RetrievalError {
    /// Whether the error aborts a search call, or only degrades one
    /// retrieval modality while the rest of the pipeline continues.
    pub const fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::GraphStore(_) | Self::EntityExtraction(_) | Self::NotFound(_)
        )
    }
}

use ripple_storage::StorageError;
use ripple_types::DocId;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the runner for a whole document pass.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A conflicting revision survived every bounded retry. Transient:
    /// the next change for the document re-evaluates from scratch.
    #[error("conflict retries exhausted for document {0}")]
    RetriesExhausted(DocId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failure of a single transition's `on_match`.
///
/// Recorded against the document and logged; never aborts the pass for
/// other transitions or other documents.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Failed(String),
}

impl TransitionError {
    pub fn failed(reason: impl Into<String>) -> Self {
        TransitionError::Failed(reason.into())
    }
}

use ripple_storage::StorageError;
use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Listener-level errors. Per-document failures never surface here;
/// they are logged with their sequence and processing continues.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

use crate::StorageResult;
use async_trait::async_trait;
use ripple_types::{ChangeEvent, DocId, Document, Sequence};
use tokio::sync::mpsc;

/// Document repository interface.
///
/// Saves use optimistic concurrency: the document's `rev` must match the
/// stored head, otherwise the call fails with `Conflict` and the caller
/// re-reads before retrying.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document. `NotFound` when absent.
    async fn get(&self, id: &DocId) -> StorageResult<Document>;

    /// Persist a document, returning the new revision.
    async fn save(&self, doc: &Document) -> StorageResult<String>;

    /// Persist a document and append an immutable audit trail entry.
    async fn audited_save(&self, doc: &Document, actor: &str) -> StorageResult<String>;

    /// Look up a contact whose shortcode identifier equals `reference`.
    /// Served from a read index in real deployments. `NotFound` when no
    /// contact carries the shortcode.
    async fn find_contact_by_reference(&self, reference: &str) -> StorageResult<Document>;
}

/// The store's ordered mutation feed.
#[async_trait]
pub trait ChangeFeedSource: Send + Sync {
    /// Subscribe from a cursor. Events arrive with non-decreasing
    /// sequence; nothing at or below `since` is redelivered. The stream is
    /// lazily infinite: a closed receiver means the source went away and
    /// the caller should resubscribe from its checkpoint.
    async fn subscribe(&self, since: Sequence) -> StorageResult<mpsc::Receiver<ChangeEvent>>;
}

/// Persistence for the listener's resume cursor.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> StorageResult<Option<Sequence>>;

    async fn store(&self, seq: Sequence) -> StorageResult<()>;
}

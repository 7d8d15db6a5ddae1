//! In-memory reference implementation for the Ripple storage traits.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! back these traits with the real document store; everything here exists
//! so the engine and listener can be exercised without one.

use crate::model::AuditRecord;
use crate::traits::{ChangeFeedSource, CheckpointStore, DocumentStore};
use crate::view::{ContactsByReference, DocumentView};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::Utc;
use ripple_types::{ChangeEvent, DocId, Document, Sequence};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// Capacity of the live change broadcast.
const CHANGE_CHANNEL_CAPACITY: usize = 16384;

/// Buffer of each feed subscription.
const SUBSCRIPTION_BUFFER: usize = 1024;

/// In-memory document store, change feed, and checkpoint store.
pub struct MemoryStore {
    docs: RwLock<HashMap<DocId, Document>>,
    /// Retained mutation log, ordered by sequence, for resumable subscriptions
    changes: RwLock<Vec<ChangeEvent>>,
    audit: RwLock<Vec<AuditRecord>>,
    checkpoint: RwLock<Option<Sequence>>,
    seq: AtomicU64,
    change_tx: broadcast::Sender<ChangeEvent>,
    reference_view: ContactsByReference,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            docs: RwLock::new(HashMap::new()),
            changes: RwLock::new(Vec::new()),
            audit: RwLock::new(Vec::new()),
            checkpoint: RwLock::new(None),
            seq: AtomicU64::new(0),
            change_tx,
            reference_view: ContactsByReference,
        }
    }

    /// Seed a document without emitting a change event. Test setup only.
    pub fn seed(&self, mut doc: Document) -> StorageResult<Document> {
        if doc.rev.is_none() {
            doc.rev = Some(make_rev(1));
        }
        let mut docs = self
            .docs
            .write()
            .map_err(|_| StorageError::Backend("docs lock poisoned".to_string()))?;
        docs.insert(doc.id.clone(), doc.clone());
        Ok(doc)
    }

    /// Remove a document and emit a deleted change event.
    pub fn delete(&self, id: &DocId) -> StorageResult<Sequence> {
        let removed = {
            let mut docs = self
                .docs
                .write()
                .map_err(|_| StorageError::Backend("docs lock poisoned".to_string()))?;
            docs.remove(id)
                .ok_or_else(|| StorageError::NotFound(format!("document {id} not found")))?
        };
        let seq = self.next_seq();
        let event = ChangeEvent::deletion(removed, seq);
        self.push_change(event)?;
        Ok(seq)
    }

    /// Audit trail entries for one document, oldest first.
    pub fn audit_for(&self, id: &DocId) -> StorageResult<Vec<AuditRecord>> {
        let audit = self
            .audit
            .read()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        Ok(audit.iter().filter(|r| &r.doc_id == id).cloned().collect())
    }

    /// Highest sequence the store has assigned so far.
    pub fn last_seq(&self) -> Sequence {
        Sequence(self.seq.load(Ordering::SeqCst))
    }

    fn next_seq(&self) -> Sequence {
        Sequence(self.seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn push_change(&self, event: ChangeEvent) -> StorageResult<()> {
        let mut changes = self
            .changes
            .write()
            .map_err(|_| StorageError::Backend("changes lock poisoned".to_string()))?;
        changes.push(event.clone());
        drop(changes);
        // No subscribers is fine
        let _ = self.change_tx.send(event);
        Ok(())
    }

    fn apply_save(&self, doc: &Document) -> StorageResult<(Document, String)> {
        let mut docs = self
            .docs
            .write()
            .map_err(|_| StorageError::Backend("docs lock poisoned".to_string()))?;

        let stored_rev = docs.get(&doc.id).and_then(|d| d.rev.clone());
        let new_rev = match (doc.rev.as_deref(), stored_rev.as_deref()) {
            (None, None) => make_rev(1),
            (Some(given), Some(stored)) if given == stored => {
                make_rev(rev_generation(stored)? + 1)
            }
            (Some(given), Some(stored)) => {
                return Err(StorageError::Conflict(format!(
                    "document {} is at revision {stored}, save carried {given}",
                    doc.id
                )));
            }
            (Some(_), None) => {
                return Err(StorageError::Conflict(format!(
                    "document {} does not exist but the save carried a revision",
                    doc.id
                )));
            }
            (None, Some(_)) => {
                return Err(StorageError::Conflict(format!(
                    "document {} already exists",
                    doc.id
                )));
            }
        };

        let mut saved = doc.clone();
        saved.rev = Some(new_rev.clone());
        docs.insert(saved.id.clone(), saved.clone());
        drop(docs);

        let event = ChangeEvent::new(saved.clone(), self.next_seq());
        self.push_change(event)?;
        Ok((saved, new_rev))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn make_rev(generation: u64) -> String {
    format!("{generation}-{}", Uuid::new_v4().simple())
}

fn rev_generation(rev: &str) -> StorageResult<u64> {
    rev.split('-')
        .next()
        .and_then(|g| g.parse().ok())
        .ok_or_else(|| StorageError::Serialization(format!("malformed revision '{rev}'")))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &DocId) -> StorageResult<Document> {
        let docs = self
            .docs
            .read()
            .map_err(|_| StorageError::Backend("docs lock poisoned".to_string()))?;
        docs.get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("document {id} not found")))
    }

    async fn save(&self, doc: &Document) -> StorageResult<String> {
        let (_, new_rev) = self.apply_save(doc)?;
        Ok(new_rev)
    }

    async fn audited_save(&self, doc: &Document, actor: &str) -> StorageResult<String> {
        let (saved, new_rev) = self.apply_save(doc)?;
        let mut audit = self
            .audit
            .write()
            .map_err(|_| StorageError::Backend("audit lock poisoned".to_string()))?;
        audit.push(AuditRecord {
            event_id: Uuid::new_v4().to_string(),
            doc_id: saved.id.clone(),
            rev: new_rev.clone(),
            actor: actor.to_string(),
            timestamp: Utc::now(),
        });
        Ok(new_rev)
    }

    async fn find_contact_by_reference(&self, reference: &str) -> StorageResult<Document> {
        let docs = self
            .docs
            .read()
            .map_err(|_| StorageError::Backend("docs lock poisoned".to_string()))?;

        let mut matches: Vec<&Document> = docs
            .values()
            .filter(|doc| {
                self.reference_view
                    .map(doc)
                    .iter()
                    .any(|(key, _)| key == &Value::String(reference.to_string()))
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));

        matches.first().map(|d| (*d).clone()).ok_or_else(|| {
            StorageError::NotFound(format!("no contact with reference '{reference}'"))
        })
    }
}

#[async_trait]
impl ChangeFeedSource for MemoryStore {
    async fn subscribe(&self, since: Sequence) -> StorageResult<mpsc::Receiver<ChangeEvent>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        // Snapshot the backlog and attach to the live stream under the same
        // lock so no event falls between the two.
        let (backlog, mut live) = {
            let changes = self
                .changes
                .read()
                .map_err(|_| StorageError::Backend("changes lock poisoned".to_string()))?;
            let backlog: Vec<ChangeEvent> =
                changes.iter().filter(|c| c.seq > since).cloned().collect();
            (backlog, self.change_tx.subscribe())
        };

        tokio::spawn(async move {
            let mut last = since;
            for event in backlog {
                last = event.seq;
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            loop {
                match live.recv().await {
                    Ok(event) => {
                        if event.seq <= last {
                            continue;
                        }
                        last = event.seq;
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "feed subscription lagged behind the store");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self) -> StorageResult<Option<Sequence>> {
        let checkpoint = self
            .checkpoint
            .read()
            .map_err(|_| StorageError::Backend("checkpoint lock poisoned".to_string()))?;
        Ok(*checkpoint)
    }

    async fn store(&self, seq: Sequence) -> StorageResult<()> {
        let mut checkpoint = self
            .checkpoint
            .write()
            .map_err(|_| StorageError::Backend("checkpoint lock poisoned".to_string()))?;
        *checkpoint = Some(seq);
        Ok(())
    }
}

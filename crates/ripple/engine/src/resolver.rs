//! Contact resolution with shortcode fallback
//!
//! References arriving in reports are either canonical document ids or
//! human-entered shortcodes. Resolution tries the id first; the shortcode
//! search runs only when the id lookup reports the record missing. Any
//! other storage failure propagates unchanged; a network error is never
//! "no match".

use ripple_storage::{DocumentStore, StorageResult};
use ripple_types::{DocId, Document};
use std::sync::Arc;

/// Resolves a person/place reference to its canonical record.
#[derive(Clone)]
pub struct ContactResolver {
    store: Arc<dyn DocumentStore>,
}

impl ContactResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Resolve a reference. `NotFound` when neither the id lookup nor the
    /// shortcode search matches.
    pub async fn resolve(&self, reference: &str) -> StorageResult<Document> {
        match self.store.get(&DocId::new(reference)).await {
            Ok(doc) => Ok(doc),
            Err(err) if err.is_not_found() => {
                tracing::debug!(reference, "no document by id, trying shortcode search");
                self.store.find_contact_by_reference(reference).await
            }
            Err(err) => Err(err),
        }
    }
}

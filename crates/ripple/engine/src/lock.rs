//! Per-document execution slots
//!
//! Events for different documents may process concurrently, but all
//! processing for one document id is serialized: `on_match` reads and
//! conditionally writes the same document and contact, and concurrent
//! passes on stale revisions would race. A keyed async mutex gives each
//! document id an exclusive slot for the duration of its pass.

use ripple_types::DocId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Keyed per-document locks. Idle slots are pruned on the next acquire.
#[derive(Default)]
pub struct DocLocks {
    slots: Mutex<HashMap<DocId, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the exclusive slot for `id`, waiting behind any in-flight
    /// pass for the same document.
    pub async fn acquire(&self, id: &DocId) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop slots nobody holds or waits on; the map only grows
            // while documents are actually in flight.
            slots.retain(|key, slot| key == id || Arc::strong_count(slot) > 1);
            slots.entry(id.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }

    /// Number of tracked slots (in-flight or not yet pruned).
    pub fn slot_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_same_document_serializes() {
        let locks = Arc::new(DocLocks::new());
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&DocId::new("d1")).await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(2)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_documents_do_not_block() {
        let locks = DocLocks::new();
        let _a = locks.acquire(&DocId::new("a")).await;
        // Completes immediately even while "a" is held
        let _b = locks.acquire(&DocId::new("b")).await;
    }

    #[tokio::test]
    async fn test_idle_slots_pruned() {
        let locks = DocLocks::new();
        {
            let _guard = locks.acquire(&DocId::new("a")).await;
        }
        {
            let _guard = locks.acquire(&DocId::new("b")).await;
        }
        // Acquiring "c" prunes the released "a" and "b" slots
        let _guard = locks.acquire(&DocId::new("c")).await;
        assert_eq!(locks.slot_count(), 1);
    }
}

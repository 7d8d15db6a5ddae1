//! Transient-failure retry at the repository boundary
//!
//! Transient I/O failures (dropped connections, store timeouts) are
//! retried with capped exponential backoff before they reach the engine.
//! Only `Transient` is retried: `NotFound` and `Conflict` are answers,
//! not outages, and callers handle them themselves.

use crate::traits::DocumentStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use ripple_types::{DocId, Document};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Backoff policy for transient failures.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Document store decorator that absorbs transient failures.
pub struct RetryingStore {
    inner: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
}

impl RetryingStore {
    pub fn new(inner: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(StorageError::Transient(reason)) if attempt < policy.attempts => {
                tracing::warn!(attempt, delay = ?delay, reason = %reason, "transient storage failure, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[async_trait]
impl DocumentStore for RetryingStore {
    async fn get(&self, id: &DocId) -> StorageResult<Document> {
        with_retry(&self.policy, || self.inner.get(id)).await
    }

    async fn save(&self, doc: &Document) -> StorageResult<String> {
        with_retry(&self.policy, || self.inner.save(doc)).await
    }

    async fn audited_save(&self, doc: &Document, actor: &str) -> StorageResult<String> {
        with_retry(&self.policy, || self.inner.audited_save(doc, actor)).await
    }

    async fn find_contact_by_reference(&self, reference: &str) -> StorageResult<Document> {
        with_retry(&self.policy, || {
            self.inner.find_contact_by_reference(reference)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with `Transient` a fixed number of times, then succeeds.
    struct FlakyStore {
        failures: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn get(&self, id: &DocId) -> StorageResult<Document> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::Transient("connection reset".to_string()));
            }
            Ok(Document::new(id.as_str()))
        }

        async fn save(&self, _doc: &Document) -> StorageResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::NotFound("nothing here".to_string()))
        }

        async fn audited_save(&self, doc: &Document, _actor: &str) -> StorageResult<String> {
            self.save(doc).await
        }

        async fn find_contact_by_reference(&self, _reference: &str) -> StorageResult<Document> {
            Err(StorageError::Transient("still down".to_string()))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_absorbed() {
        let flaky = Arc::new(FlakyStore::new(2));
        let store = RetryingStore::new(flaky.clone(), fast_policy());

        let doc = store.get(&DocId::new("d1")).await.unwrap();
        assert_eq!(doc.id, DocId::new("d1"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let store = RetryingStore::new(Arc::new(FlakyStore::new(u32::MAX)), fast_policy());

        let err = store.find_contact_by_reference("x").await.unwrap_err();
        assert!(matches!(err, StorageError::Transient(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_never_retried() {
        let flaky = Arc::new(FlakyStore::new(0));
        let store = RetryingStore::new(flaky.clone(), fast_policy());

        let err = store.save(&Document::new("d1")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }
}

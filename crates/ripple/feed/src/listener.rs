//! Change feed listener
//!
//! Single logical consumer per cursor: subscribes from the last
//! checkpoint, fans document passes out to a bounded worker pool, and
//! reconnects with capped backoff when the source goes away. Redelivery
//! after a crash or reconnect is safe because the runner is idempotent.

use crate::error::FeedResult;
use crate::watermark::Watermark;
use ripple_engine::TransitionRunner;
use ripple_storage::{ChangeFeedSource, CheckpointStore};
use ripple_types::{ChangeEvent, Sequence};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;

/// Listener tuning.
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    /// Concurrent document passes. Same-document serialization is the
    /// runner's keyed locks; this only bounds parallel I/O.
    pub concurrency: usize,
    /// First reconnect delay after the source drops.
    pub reconnect_initial: Duration,
    /// Reconnect delay cap.
    pub reconnect_max: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

/// Consumes the store's mutation feed and drives the runner.
pub struct FeedListener {
    source: Arc<dyn ChangeFeedSource>,
    checkpoints: Arc<dyn CheckpointStore>,
    runner: Arc<TransitionRunner>,
    config: ListenerConfig,
}

impl FeedListener {
    pub fn new(
        source: Arc<dyn ChangeFeedSource>,
        checkpoints: Arc<dyn CheckpointStore>,
        runner: Arc<TransitionRunner>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            source,
            checkpoints,
            runner,
            config,
        }
    }

    /// Run until `shutdown` flips true. On shutdown the listener stops
    /// accepting events, drains in-flight passes, and checkpoints the
    /// final watermark.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> FeedResult<()> {
        let mut cursor = self
            .checkpoints
            .load()
            .await?
            .unwrap_or(Sequence::ZERO);
        tracing::info!(cursor = %cursor, "feed listener starting");

        let mut backoff = self.config.reconnect_initial;
        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let rx = match self.source.subscribe(cursor).await {
                Ok(rx) => {
                    backoff = self.config.reconnect_initial;
                    rx
                }
                Err(err) => {
                    tracing::warn!(error = %err, delay = ?backoff, "feed subscription failed");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {}
                    }
                    backoff = (backoff * 2).min(self.config.reconnect_max);
                    continue;
                }
            };

            cursor = self.consume(rx, cursor, &mut shutdown).await?;

            if *shutdown.borrow() {
                tracing::info!(cursor = %cursor, "feed listener drained");
                return Ok(());
            }
            tracing::info!(cursor = %cursor, delay = ?backoff, "feed source closed, resubscribing");
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.changed() => {}
            }
            backoff = (backoff * 2).min(self.config.reconnect_max);
        }
    }

    /// Drain one subscription. Returns the checkpoint reached when the
    /// source closed or shutdown was requested.
    async fn consume(
        &self,
        mut rx: mpsc::Receiver<ChangeEvent>,
        since: Sequence,
        shutdown: &mut watch::Receiver<bool>,
    ) -> FeedResult<Sequence> {
        let watermark = Arc::new(Mutex::new(Watermark::new(since)));
        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                maybe = rx.recv() => {
                    let Some(event) = maybe else { break };
                    self.dispatch(event, &watermark, &permits, &mut workers).await;
                }
            }
        }

        // Drain in-flight passes; no new events are accepted
        while workers.join_next().await.is_some() {}

        let checkpoint = watermark
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .checkpoint();
        if let Err(err) = self.checkpoints.store(checkpoint).await {
            tracing::warn!(error = %err, cursor = %checkpoint, "final checkpoint failed");
        }
        Ok(checkpoint)
    }

    async fn dispatch(
        &self,
        event: ChangeEvent,
        watermark: &Arc<Mutex<Watermark>>,
        permits: &Arc<Semaphore>,
        workers: &mut JoinSet<()>,
    ) {
        let seq = event.seq;
        watermark
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .begin(seq);

        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            // Semaphore closure only happens on teardown
            Err(_) => return,
        };

        let runner = self.runner.clone();
        let checkpoints = self.checkpoints.clone();
        let watermark = watermark.clone();
        workers.spawn(async move {
            let _permit = permit;
            match runner.process_change(&event).await {
                Ok(report) if report.changed() => {
                    tracing::debug!(
                        doc_id = %report.doc_id,
                        seq = %seq,
                        executed = report.executed.len(),
                        failed = report.failed.len(),
                        "document pass complete"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    // The pass is abandoned; the document's next change
                    // re-evaluates everything the guard has not sealed.
                    tracing::error!(doc_id = %event.doc.id, seq = %seq, error = %err, "document pass failed");
                }
            }

            let advanced = watermark
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .complete(seq);
            if let Some(cursor) = advanced {
                if let Err(err) = checkpoints.store(cursor).await {
                    tracing::warn!(error = %err, cursor = %cursor, "checkpoint write failed");
                }
            }
        });
    }
}

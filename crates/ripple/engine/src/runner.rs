//! Transition runner: the per-change state machine
//!
//! For each change the runner walks the registry in declared order. Per
//! (document, transition) pair the states are
//! `UNSEEN → SKIPPED | RAN_OK | RAN_NOOP | FAILED`; `RAN_OK` is terminal,
//! enforced by the history guard before the filter ever runs. A no-op
//! leaves no trace and is re-evaluated on later changes; a failure is
//! recorded not-ok, logged, and never blocks the remaining transitions.
//!
//! Saves use optimistic concurrency. A conflicting revision means another
//! writer got there first: the runner re-reads the document and re-runs
//! the whole pass from scratch, bounded by the configured retry count.
//! The guard keeps completed transitions from executing twice.

use crate::error::{EngineError, EngineResult};
use crate::lock::DocLocks;
use crate::registry::TransitionRegistry;
use crate::resolver::ContactResolver;
use crate::transition::{RunContext, Transition};
use ripple_config::SettingsProvider;
use ripple_storage::DocumentStore;
use ripple_types::{ChangeEvent, DocId, Sequence};
use std::sync::Arc;

/// Runner tuning.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Re-read/retry attempts after a conflicting save before the pass
    /// surfaces a transient failure.
    pub max_conflict_retries: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
        }
    }
}

/// What one document pass did.
#[derive(Clone, Debug)]
pub struct PassReport {
    pub doc_id: DocId,
    pub seq: Sequence,
    /// Transitions recorded ok, in execution order
    pub executed: Vec<String>,
    /// Transitions recorded not-ok
    pub failed: Vec<String>,
    pub conflict_retries: u32,
}

impl PassReport {
    /// Whether the pass wrote anything to the store.
    pub fn changed(&self) -> bool {
        !self.executed.is_empty() || !self.failed.is_empty()
    }
}

/// Applies the registered transitions to each change event.
pub struct TransitionRunner {
    registry: Arc<TransitionRegistry>,
    store: Arc<dyn DocumentStore>,
    resolver: ContactResolver,
    settings: Arc<SettingsProvider>,
    locks: DocLocks,
    config: RunnerConfig,
}

impl TransitionRunner {
    pub fn new(
        registry: TransitionRegistry,
        store: Arc<dyn DocumentStore>,
        settings: Arc<SettingsProvider>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            resolver: ContactResolver::new(store.clone()),
            store,
            settings,
            locks: DocLocks::new(),
            config,
        }
    }

    /// Run the full transition pass for one change, serialized per
    /// document id. Failures of individual transitions are recorded and
    /// do not surface here; only storage breakdown does.
    pub async fn process_change(&self, change: &ChangeEvent) -> EngineResult<PassReport> {
        let _slot = self.locks.acquire(&change.doc.id).await;

        // One consistent settings snapshot for the entire pass
        let settings = self.settings.current();
        let ctx = RunContext {
            store: self.store.clone(),
            resolver: self.resolver.clone(),
            settings: settings.clone(),
        };

        let mut report = PassReport {
            doc_id: change.doc.id.clone(),
            seq: change.seq,
            executed: Vec::new(),
            failed: Vec::new(),
            conflict_retries: 0,
        };
        let mut doc = change.doc.clone();

        'pass: loop {
            for transition in self.registry.all() {
                let name = transition.name();
                if doc.has_run(name) {
                    continue;
                }
                if change.deleted && !transition.handles_deletions() {
                    continue;
                }
                if !transition.filter(&doc, &settings) {
                    continue;
                }

                // The handler sees the document as the pass currently
                // knows it, history from earlier transitions included.
                let current = ChangeEvent {
                    doc: doc.clone(),
                    seq: change.seq,
                    deleted: change.deleted,
                };
                let ok = match transition.on_match(&current, &ctx).await {
                    Ok(true) => true,
                    Ok(false) => {
                        tracing::debug!(
                            transition = name,
                            doc_id = %doc.id,
                            seq = %change.seq,
                            "transition resolved without executing"
                        );
                        continue;
                    }
                    Err(err) => {
                        tracing::warn!(
                            transition = name,
                            doc_id = %doc.id,
                            seq = %change.seq,
                            error = %err,
                            "transition failed"
                        );
                        false
                    }
                };

                doc.record_transition(name, ok, change.seq);
                match self.store.save(&doc).await {
                    Ok(rev) => {
                        doc.rev = Some(rev);
                        let list = if ok {
                            &mut report.executed
                        } else {
                            &mut report.failed
                        };
                        if !list.iter().any(|n| n == name) {
                            list.push(name.to_string());
                        }
                        tracing::info!(
                            transition = name,
                            doc_id = %doc.id,
                            seq = %change.seq,
                            ok,
                            "transition recorded"
                        );
                    }
                    Err(err) if err.is_conflict() => {
                        report.conflict_retries += 1;
                        if report.conflict_retries > self.config.max_conflict_retries {
                            return Err(EngineError::RetriesExhausted(doc.id));
                        }
                        tracing::debug!(
                            doc_id = %doc.id,
                            seq = %change.seq,
                            attempt = report.conflict_retries,
                            "conflicting revision, re-reading and re-running the pass"
                        );
                        doc = match self.store.get(&change.doc.id).await {
                            Ok(fresh) => fresh,
                            Err(err) if err.is_not_found() => {
                                // Deleted while in flight; nothing left to record
                                tracing::warn!(
                                    doc_id = %change.doc.id,
                                    seq = %change.seq,
                                    "document vanished during conflict retry"
                                );
                                return Ok(report);
                            }
                            Err(err) => return Err(err.into()),
                        };
                        continue 'pass;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            return Ok(report);
        }
    }
}

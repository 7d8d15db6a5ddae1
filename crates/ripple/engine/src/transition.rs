//! The transition capability set
//!
//! A transition is a named, independently filterable workflow rule. The
//! runner owns when a transition runs; the transition owns what it does.
//! Definitions are stateless and may be invoked concurrently for
//! different documents.

use crate::error::TransitionError;
use crate::resolver::ContactResolver;
use async_trait::async_trait;
use ripple_config::{ConfigResult, Settings};
use ripple_storage::DocumentStore;
use ripple_types::{ChangeEvent, Document};
use std::sync::Arc;

/// Everything an `on_match` handler may touch.
///
/// The settings snapshot is taken once per change: a single invocation
/// never observes a mid-run configuration reload.
pub struct RunContext {
    pub store: Arc<dyn DocumentStore>,
    pub resolver: ContactResolver,
    pub settings: Arc<Settings>,
}

#[async_trait]
pub trait Transition: Send + Sync {
    /// Stable name recorded in transition history.
    fn name(&self) -> &'static str;

    /// Whether deletion events reach this transition. Deleted documents
    /// are skipped by default.
    fn handles_deletions(&self) -> bool {
        false
    }

    /// Startup validation hook. An error here aborts initialization:
    /// a misconfigured rule must never run silently.
    fn init(&self, settings: &Settings) -> ConfigResult<()>;

    /// Pure predicate deciding whether the document is eligible. Must not
    /// perform I/O; the runner applies the history guard before calling.
    fn filter(&self, doc: &Document, settings: &Settings) -> bool;

    /// Execute the rule against a matched change.
    ///
    /// `Ok(true)` means executed: the runner records it in history,
    /// making it terminal for this document. `Ok(false)` means no-op:
    /// nothing is recorded and a later change re-evaluates from the
    /// filter. `Err` is a failure: recorded as not-ok, logged, and
    /// retried on later changes.
    async fn on_match(
        &self,
        change: &ChangeEvent,
        ctx: &RunContext,
    ) -> Result<bool, TransitionError>;
}

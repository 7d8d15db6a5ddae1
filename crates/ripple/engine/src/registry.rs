//! Transition registry: the ordered rule set
//!
//! Registration order is execution order for a single document, which
//! lets a later transition observe history written by an earlier one
//! within the same change.

use crate::transition::Transition;
use ripple_config::{ConfigError, ConfigResult, Settings};
use std::sync::Arc;

/// Ordered collection of transition definitions.
#[derive(Clone, Default)]
pub struct TransitionRegistry {
    transitions: Vec<Arc<dyn Transition>>,
}

impl TransitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a definition. Names must be unique: history records are
    /// keyed by name, so a duplicate would corrupt the guard.
    pub fn register(&mut self, transition: Arc<dyn Transition>) -> ConfigResult<()> {
        let name = transition.name();
        if self.transitions.iter().any(|t| t.name() == name) {
            return Err(ConfigError::Transition {
                transition: name.to_string(),
                reason: "registered twice".to_string(),
            });
        }
        tracing::info!(transition = name, "transition registered");
        self.transitions.push(transition);
        Ok(())
    }

    /// Definitions in registration order.
    pub fn all(&self) -> &[Arc<dyn Transition>] {
        &self.transitions
    }

    /// Run every definition's startup validation. The first failure
    /// aborts: a rule with missing or structurally invalid configuration
    /// must never run.
    pub fn init_all(&self, settings: &Settings) -> ConfigResult<()> {
        for transition in &self.transitions {
            transition.init(settings)?;
        }
        tracing::info!(count = self.transitions.len(), "transitions initialized");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

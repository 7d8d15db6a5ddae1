//! Built-in transitions
//!
//! Each transition is one workflow rule implementing the engine's
//! [`Transition`](ripple_engine::Transition) capability set. The runner
//! decides when a rule executes; the rule decides what a matched change
//! means.

#![deny(unsafe_code)]

pub mod death_reporting;

pub use death_reporting::DeathReporting;

use ripple_config::ConfigResult;
use ripple_engine::TransitionRegistry;
use std::sync::Arc;

/// The stock registry: every built-in transition in its declared order.
pub fn default_registry() -> ConfigResult<TransitionRegistry> {
    let mut registry = TransitionRegistry::new();
    registry.register(Arc::new(DeathReporting))?;
    Ok(registry)
}

//! Domain types for Ripple
//!
//! The document model mirrors the wire format of the backing document
//! store: documents are JSON objects with store-assigned `_id`/`_rev`
//! fields, a `type` discriminator, and free-form report `fields`. The
//! engine's own bookkeeping lives in `transition_history`, an append-only
//! sequence of execution records.

#![deny(unsafe_code)]

pub mod change;
pub mod document;

pub use change::{ChangeEvent, Sequence};
pub use document::{DocId, Document, TransitionRecord};

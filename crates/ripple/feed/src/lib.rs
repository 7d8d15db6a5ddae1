//! Change feed consumption for Ripple
//!
//! The listener is the single logical consumer of the store's mutation
//! feed: it resumes from a persisted cursor, hands each change to the
//! transition runner under a bounded worker pool, and reconnects with
//! capped backoff. The low-watermark cursor guarantees a restart never
//! skips an unprocessed sequence; redelivery is harmless because the
//! runner is idempotent.

#![deny(unsafe_code)]

pub mod error;
pub mod listener;
pub mod watermark;

pub use error::{FeedError, FeedResult};
pub use listener::{FeedListener, ListenerConfig};
pub use watermark::Watermark;

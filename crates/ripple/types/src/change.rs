//! Change events: per-mutation notifications from the store's feed

use crate::document::Document;
use serde::{Deserialize, Serialize};

/// Feed cursor value.
///
/// Opaque to consumers beyond ordering: the feed guarantees events arrive
/// with non-decreasing sequence, and resuming from a previously issued
/// sequence redelivers nothing at or below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sequence(pub u64);

impl Sequence {
    /// Cursor that precedes every event
    pub const ZERO: Sequence = Sequence(0);
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One document mutation delivered by the change feed.
///
/// Transient: processed and discarded. Durability lives in the document's
/// own transition history, not in the event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The document at the revision that produced this event
    pub doc: Document,
    /// Feed cursor of this mutation
    pub seq: Sequence,
    /// Whether the mutation was a deletion
    #[serde(default)]
    pub deleted: bool,
}

impl ChangeEvent {
    pub fn new(doc: Document, seq: Sequence) -> Self {
        Self {
            doc,
            seq,
            deleted: false,
        }
    }

    pub fn deletion(doc: Document, seq: Sequence) -> Self {
        Self {
            doc,
            seq,
            deleted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_ordering() {
        assert!(Sequence(1) < Sequence(2));
        assert!(Sequence::ZERO < Sequence(1));
        assert_eq!(Sequence(5), Sequence(5));
    }

    #[test]
    fn test_deleted_defaults_false() {
        let event: ChangeEvent = serde_json::from_value(serde_json::json!({
            "doc": { "_id": "d1" },
            "seq": 4
        }))
        .unwrap();
        assert!(!event.deleted);
        assert_eq!(event.seq, Sequence(4));
    }
}

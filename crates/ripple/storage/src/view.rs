//! View collaborator contract
//!
//! Views are pure, stateless map functions the store runs over every
//! document to build read-optimized indexes. They are external to the
//! transition engine and never participate in the history guard, but
//! the repository's contact-by-reference lookup is served from one, so the
//! contract and that one view live here.

use ripple_types::Document;
use serde_json::Value;

/// A read-index map function: zero or more emitted (key, value) pairs per
/// document over the full document set.
pub trait DocumentView: Send + Sync {
    fn name(&self) -> &'static str;

    fn map(&self, doc: &Document) -> Vec<(Value, Value)>;
}

/// Indexes contact records by their human-enterable shortcode, backing the
/// resolver's fallback path.
pub struct ContactsByReference;

const CONTACT_TYPES: &[&str] = &["person", "clinic", "health_center", "district_hospital"];

impl DocumentView for ContactsByReference {
    fn name(&self) -> &'static str {
        "contacts_by_reference"
    }

    fn map(&self, doc: &Document) -> Vec<(Value, Value)> {
        let is_contact = doc
            .doc_type
            .as_deref()
            .is_some_and(|t| CONTACT_TYPES.contains(&t));
        if !is_contact {
            return Vec::new();
        }
        match doc.patient_id.as_deref() {
            Some(shortcode) if !shortcode.is_empty() => {
                vec![(Value::String(shortcode.to_string()), Value::Null)]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_types::Document;
    use serde_json::json;

    #[test]
    fn test_emits_shortcode_for_contacts() {
        let mut person = Document::new("p1").with_type("person");
        person.patient_id = Some("12345".to_string());

        let view = ContactsByReference;
        let rows = view.map(&person);
        assert_eq!(rows, vec![(json!("12345"), Value::Null)]);
    }

    #[test]
    fn test_skips_reports_and_unkeyed_contacts() {
        let view = ContactsByReference;

        let report = Document::new("r1").with_type("data_record");
        assert!(view.map(&report).is_empty());

        let unkeyed = Document::new("p2").with_type("person");
        assert!(view.map(&unkeyed).is_empty());
    }
}

//! Documents: versioned records in the backing store
//!
//! A document is any JSON record the store holds: reports, registrations,
//! person and place contacts. Fields the engine does not model are carried
//! through untouched in `extra`, so a save never strips data written by
//! other components.

use crate::change::Sequence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Document Identifier ──────────────────────────────────────────────

/// Unique identifier for a document
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub String);

impl DocId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Transition History ───────────────────────────────────────────────

/// One recorded transition attempt on a document.
///
/// History is append-only: a record is never rewritten once stored. The
/// sequence is the feed cursor of the change that triggered the attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Name of the transition that ran
    pub transition: String,
    /// Whether the transition reported successful execution
    pub ok: bool,
    /// Feed sequence of the triggering change
    pub sequence: Sequence,
    /// When the record was written
    pub timestamp: DateTime<Utc>,
}

// ── Document ─────────────────────────────────────────────────────────

/// A versioned record in the document store.
///
/// `reported_date` and `date_of_death` are epoch milliseconds, as written
/// by the upstream data-collection clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    /// Store identifier
    #[serde(rename = "_id")]
    pub id: DocId,
    /// Store revision; absent until first saved
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Document type discriminator ("data_record", "person", ...)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Form code for report documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
    /// Sender of a report (phone number or contact reference)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Report field payload
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    /// When the report was submitted, epoch ms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_date: Option<i64>,
    /// Contact variant: date of death, epoch ms, unset while alive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_death: Option<i64>,
    /// Contact variant: human-enterable shortcode identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    /// Contact variant: display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Append-only record of transition executions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transition_history: Vec<TransitionRecord>,
    /// Fields this engine does not model, preserved across saves
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// Create an unsaved document with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: DocId::new(id),
            rev: None,
            doc_type: None,
            form: None,
            from: None,
            fields: Map::new(),
            reported_date: None,
            date_of_death: None,
            patient_id: None,
            name: None,
            transition_history: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn with_form(mut self, form: impl Into<String>) -> Self {
        self.form = Some(form.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Whether this is a report submitted by a health worker
    pub fn is_data_record(&self) -> bool {
        self.doc_type.as_deref() == Some("data_record")
    }

    /// The `fields.patient_id` reference of a report, if present and non-empty
    pub fn patient_ref(&self) -> Option<&str> {
        self.fields
            .get("patient_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// History guard predicate: has `name` already executed successfully?
    ///
    /// Only `ok == true` records count. Failed attempts stay retryable.
    pub fn has_run(&self, name: &str) -> bool {
        self.transition_history
            .iter()
            .any(|r| r.ok && r.transition == name)
    }

    /// Append an execution record. History is never rewritten.
    pub fn record_transition(&mut self, name: impl Into<String>, ok: bool, sequence: Sequence) {
        self.transition_history.push(TransitionRecord {
            transition: name.into(),
            ok,
            sequence,
            timestamp: Utc::now(),
        });
    }

    /// Most recent history record for `name`, if any
    pub fn last_record(&self, name: &str) -> Option<&TransitionRecord> {
        self.transition_history
            .iter()
            .rev()
            .find(|r| r.transition == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_has_run_only_counts_ok() {
        let mut doc = Document::new("d1");
        assert!(!doc.has_run("death_reporting"));

        doc.record_transition("death_reporting", false, Sequence(3));
        assert!(!doc.has_run("death_reporting"));

        doc.record_transition("death_reporting", true, Sequence(7));
        assert!(doc.has_run("death_reporting"));
        assert!(!doc.has_run("other"));
    }

    #[test]
    fn test_history_is_append_only() {
        let mut doc = Document::new("d1");
        doc.record_transition("a", false, Sequence(1));
        doc.record_transition("a", true, Sequence(2));

        assert_eq!(doc.transition_history.len(), 2);
        assert!(!doc.transition_history[0].ok);
        assert!(doc.transition_history[1].ok);
        assert_eq!(doc.last_record("a").unwrap().sequence, Sequence(2));
    }

    #[test]
    fn test_patient_ref() {
        let doc = Document::new("d1").with_field("patient_id", json!("p1"));
        assert_eq!(doc.patient_ref(), Some("p1"));

        let empty = Document::new("d2").with_field("patient_id", json!(""));
        assert_eq!(empty.patient_ref(), None);

        let missing = Document::new("d3");
        assert_eq!(missing.patient_ref(), None);
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = json!({
            "_id": "r1",
            "_rev": "2-abc",
            "type": "data_record",
            "form": "deceased",
            "from": "+15551234",
            "fields": { "patient_id": "p1" },
            "reported_date": 1_700_000_000_000_i64,
            "sms_message": { "gateway_ref": "g-77" },
            "errors": []
        });

        let doc: Document = serde_json::from_value(raw.clone()).unwrap();
        assert!(doc.is_data_record());
        assert_eq!(doc.rev.as_deref(), Some("2-abc"));
        assert!(doc.extra.contains_key("sms_message"));

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["sms_message"]["gateway_ref"], "g-77");
        assert_eq!(back["form"], "deceased");
    }

    #[test]
    fn test_empty_history_not_serialized() {
        let doc = Document::new("d1");
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("transition_history").is_none());
    }
}

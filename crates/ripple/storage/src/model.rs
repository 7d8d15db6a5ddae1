use chrono::{DateTime, Utc};
use ripple_types::DocId;
use serde::{Deserialize, Serialize};

/// Immutable audit trail entry written alongside an audited save.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub doc_id: DocId,
    /// Revision the save produced
    pub rev: String,
    /// Component that performed the write
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

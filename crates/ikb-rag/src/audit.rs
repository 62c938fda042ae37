//! Question/answer audit trail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deadline::Deadline;
use crate::error::Result;
use crate::rag::gate::RejectReason;
use crate::types::{RetrievalResultView, SectionWeights};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditMetadata {
    pub section_weights: SectionWeights,
    pub result_count: usize,
    /// Gate stage that turned the question away, when rejections are audited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectReason>,
}

/// What the engine hands to a sink; the sink stamps id and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub question: String,
    pub answer: String,
    pub retrieved_documents: Vec<RetrievalResultView>,
    pub metadata: AuditMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: AuditEntry,
}

impl AuditRecord {
    pub fn stamp(entry: AuditEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            entry,
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one entry, returning the id it was stored under.
    async fn record(&self, entry: AuditEntry, deadline: &Deadline) -> Result<Uuid>;

    /// Most recent records first, at most `limit`.
    async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>>;
}

/// Keeps the audit trail in process memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry, _deadline: &Deadline) -> Result<Uuid> {
        let record = AuditRecord::stamp(entry);
        let id = record.id;
        self.records.write().push(record);
        tracing::debug!(%id, "Audit record stored");
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        // Insertion order is chronological.
        Ok(self
            .records
            .read()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

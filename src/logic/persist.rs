//! Persistent Store Seam
//!
//! The durable store is an external collaborator: typed insert/update/
//! select per table plus a subscribe-to-changes primitive. The engine
//! only talks to this trait; `memory::MemoryStore` is the in-process
//! backend used by tests and local development.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{Alert, AlertChange, AlertPatch, Evidence, EvidenceChange, Incident};

pub mod memory;

/// Failures surfaced by the Persistent Store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Durable record storage with a change-stream primitive.
///
/// Tables used: alerts, evidence, incidents. Selects are bounded and
/// ordered by creation time descending (most recent first).
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError>;
    async fn update_alert(&self, id: Uuid, patch: &AlertPatch) -> Result<(), StoreError>;
    async fn select_recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError>;

    async fn insert_evidence(&self, evidence: &Evidence) -> Result<(), StoreError>;
    async fn select_recent_evidence(&self, limit: usize) -> Result<Vec<Evidence>, StoreError>;

    async fn insert_incident(&self, incident: &Incident) -> Result<(), StoreError>;

    /// Subscribe to the alerts table. Events for a given record id are
    /// delivered in the order they were applied.
    fn subscribe_alerts(&self) -> mpsc::UnboundedReceiver<AlertChange>;

    /// Subscribe to the evidence table.
    fn subscribe_evidence(&self) -> mpsc::UnboundedReceiver<EvidenceChange>;
}

/// External case-number sequence, assumed globally monotonic/unique
#[async_trait]
pub trait CaseNumberAllocator: Send + Sync {
    async fn next_case_number(&self) -> Result<String, StoreError>;
}

/// Simple local allocator: `PREFIX-0001`, `PREFIX-0002`, ...
pub struct SequenceAllocator {
    prefix: String,
    next: std::sync::atomic::AtomicU64,
}

impl SequenceAllocator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: std::sync::atomic::AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl CaseNumberAllocator for SequenceAllocator {
    async fn next_case_number(&self) -> Result<String, StoreError> {
        let n = self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(format!("{}-{:04}", self.prefix, n))
    }
}

//! In-Memory Persistent Store
//!
//! Backend for tests and local development. Mirrors the real store's
//! observable behavior: every confirmed write is echoed to all
//! change-stream subscribers, including the client that issued it.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{PersistentStore, StoreError};
use crate::logic::types::{
    Alert, AlertChange, AlertPatch, ChangeOp, Evidence, EvidenceChange, Incident,
};

pub struct MemoryStore {
    alerts: Mutex<Vec<Alert>>,
    evidence: Mutex<Vec<Evidence>>,
    incidents: Mutex<Vec<Incident>>,
    alert_subs: Mutex<Vec<mpsc::UnboundedSender<AlertChange>>>,
    evidence_subs: Mutex<Vec<mpsc::UnboundedSender<EvidenceChange>>>,
    /// Failure injection for tests
    fail_alert_writes: AtomicBool,
    fail_incident_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            evidence: Mutex::new(Vec::new()),
            incidents: Mutex::new(Vec::new()),
            alert_subs: Mutex::new(Vec::new()),
            evidence_subs: Mutex::new(Vec::new()),
            fail_alert_writes: AtomicBool::new(false),
            fail_incident_writes: AtomicBool::new(false),
        }
    }

    /// Make alert/evidence writes fail (persistence-failure paths)
    pub fn set_fail_alert_writes(&self, fail: bool) {
        self.fail_alert_writes.store(fail, Ordering::Relaxed);
    }

    /// Make incident inserts fail (escalation-failure paths)
    pub fn set_fail_incident_writes(&self, fail: bool) {
        self.fail_incident_writes.store(fail, Ordering::Relaxed);
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().len()
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence.lock().len()
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents.lock().clone()
    }

    pub fn get_alert(&self, id: Uuid) -> Option<Alert> {
        self.alerts.lock().iter().find(|a| a.id == id).cloned()
    }

    /// Push a change event as if a remote client had written the row.
    /// Does not touch the stored rows; tests drive reconciliation with it.
    pub fn emit_alert_change(&self, change: AlertChange) {
        self.fanout_alert(change);
    }

    pub fn emit_evidence_change(&self, change: EvidenceChange) {
        self.fanout_evidence(change);
    }

    fn fanout_alert(&self, change: AlertChange) {
        self.alert_subs
            .lock()
            .retain(|tx| tx.send(change.clone()).is_ok());
    }

    fn fanout_evidence(&self, change: EvidenceChange) {
        self.evidence_subs
            .lock()
            .retain(|tx| tx.send(change.clone()).is_ok());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        if self.fail_alert_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("alert insert rejected".to_string()));
        }
        self.alerts.lock().push(alert.clone());
        self.fanout_alert(AlertChange {
            op: ChangeOp::Insert,
            record: alert.clone(),
        });
        Ok(())
    }

    async fn update_alert(&self, id: Uuid, patch: &AlertPatch) -> Result<(), StoreError> {
        if self.fail_alert_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("alert update rejected".to_string()));
        }
        let updated = {
            let mut alerts = self.alerts.lock();
            match alerts.iter_mut().find(|a| a.id == id) {
                Some(alert) => {
                    patch.apply_to(alert);
                    alert.clone()
                }
                None => return Err(StoreError::NotFound(format!("alert {}", id))),
            }
        };
        self.fanout_alert(AlertChange {
            op: ChangeOp::Update,
            record: updated,
        });
        Ok(())
    }

    async fn select_recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError> {
        let mut alerts = self.alerts.lock().clone();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn insert_evidence(&self, evidence: &Evidence) -> Result<(), StoreError> {
        if self.fail_alert_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("evidence insert rejected".to_string()));
        }
        self.evidence.lock().push(evidence.clone());
        self.fanout_evidence(EvidenceChange {
            op: ChangeOp::Insert,
            record: evidence.clone(),
        });
        Ok(())
    }

    async fn select_recent_evidence(&self, limit: usize) -> Result<Vec<Evidence>, StoreError> {
        let mut evidence = self.evidence.lock().clone();
        evidence.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        evidence.truncate(limit);
        Ok(evidence)
    }

    async fn insert_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        if self.fail_incident_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Backend("incident insert rejected".to_string()));
        }
        self.incidents.lock().push(incident.clone());
        Ok(())
    }

    fn subscribe_alerts(&self) -> mpsc::UnboundedReceiver<AlertChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.alert_subs.lock().push(tx);
        rx
    }

    fn subscribe_evidence(&self) -> mpsc::UnboundedReceiver<EvidenceChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.evidence_subs.lock().push(tx);
        rx
    }
}

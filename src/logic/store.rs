//! Alert Store
//!
//! Authoritative in-memory set of alerts and evidence. Seeded once from
//! the Persistent Store, kept current by the subscribed change-stream,
//! and mutated optimistically by local actions ahead of store
//! confirmation.
//!
//! Reconciliation rules:
//! - streamed insert for an id already present locally is ignored
//!   (identity wins over duplication; suppresses our own echo)
//! - streamed update replaces the local copy wholesale
//! - streamed delete removes the record

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::types::{Alert, AlertChange, AlertStatus, ChangeOp, Evidence, EvidenceChange, Severity};

pub struct AlertStore {
    alerts: RwLock<HashMap<Uuid, Alert>>,
    evidence: RwLock<HashMap<Uuid, Evidence>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(HashMap::new()),
            evidence: RwLock::new(HashMap::new()),
        }
    }

    // ========================================================================
    // SEED / LOCAL MUTATION
    // ========================================================================

    /// Replace contents with the initial bulk load
    pub fn seed(&self, alerts: Vec<Alert>, evidence: Vec<Evidence>) {
        let mut alert_map = self.alerts.write();
        alert_map.clear();
        for alert in alerts {
            alert_map.insert(alert.id, alert);
        }
        drop(alert_map);

        let mut evidence_map = self.evidence.write();
        evidence_map.clear();
        for record in evidence {
            evidence_map.insert(record.id, record);
        }
    }

    /// Optimistic local insert, ahead of the store echo
    pub fn insert_alert(&self, alert: Alert) {
        self.alerts.write().insert(alert.id, alert);
    }

    pub fn insert_evidence(&self, evidence: Evidence) {
        self.evidence.write().insert(evidence.id, evidence);
    }

    /// Optimistic local mutation. Returns the updated alert, or None if
    /// the id is unknown.
    pub fn modify_alert<F>(&self, id: Uuid, mutate: F) -> Option<Alert>
    where
        F: FnOnce(&mut Alert),
    {
        let mut alerts = self.alerts.write();
        let alert = alerts.get_mut(&id)?;
        mutate(alert);
        Some(alert.clone())
    }

    // ========================================================================
    // CHANGE-STREAM RECONCILIATION
    // ========================================================================

    pub fn apply_alert_change(&self, change: AlertChange) {
        let mut alerts = self.alerts.write();
        match change.op {
            ChangeOp::Insert => {
                if alerts.contains_key(&change.record.id) {
                    // Our own write echoed back - identity wins
                    log::debug!("Suppressed duplicate alert insert {}", change.record.id);
                    return;
                }
                alerts.insert(change.record.id, change.record);
            }
            ChangeOp::Update => {
                // Server state is authoritative for updates
                alerts.insert(change.record.id, change.record);
            }
            ChangeOp::Delete => {
                alerts.remove(&change.record.id);
            }
        }
    }

    pub fn apply_evidence_change(&self, change: EvidenceChange) {
        let mut evidence = self.evidence.write();
        match change.op {
            ChangeOp::Insert => {
                if evidence.contains_key(&change.record.id) {
                    log::debug!("Suppressed duplicate evidence insert {}", change.record.id);
                    return;
                }
                evidence.insert(change.record.id, change.record);
            }
            ChangeOp::Update => {
                evidence.insert(change.record.id, change.record);
            }
            ChangeOp::Delete => {
                evidence.remove(&change.record.id);
            }
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn get_alert(&self, id: Uuid) -> Option<Alert> {
        self.alerts.read().get(&id).cloned()
    }

    /// All alerts, newest first
    pub fn alerts(&self) -> Vec<Alert> {
        let mut list: Vec<Alert> = self.alerts.read().values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn evidence(&self) -> Vec<Evidence> {
        let mut list: Vec<Evidence> = self.evidence.read().values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.read().len()
    }

    pub fn count_by_status(&self, status: AlertStatus) -> usize {
        self.alerts
            .read()
            .values()
            .filter(|a| a.status == status)
            .count()
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.alerts
            .read()
            .values()
            .filter(|a| a.severity == severity)
            .count()
    }

    /// Alerts of a severity still awaiting triage
    pub fn count_open_by_severity(&self, severity: Severity) -> usize {
        self.alerts
            .read()
            .values()
            .filter(|a| a.severity == severity && a.status.is_open())
            .count()
    }

    /// Wait time in seconds of every currently pending alert
    pub fn pending_ages_secs(&self, now: DateTime<Utc>) -> Vec<f64> {
        self.alerts
            .read()
            .values()
            .filter(|a| a.status == AlertStatus::Pending)
            .map(|a| {
                let age = now.signed_duration_since(a.created_at);
                (age.num_milliseconds() as f64 / 1000.0).max(0.0)
            })
            .collect()
    }
}

impl Default for AlertStore {
    fn default() -> Self {
        Self::new()
    }
}

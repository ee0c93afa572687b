//! Escalation Engine
//!
//! Per-alert state machine: pending -> acknowledged -> resolved, with
//! pending|acknowledged -> dismissed, plus the irreversible escalated
//! flag (a non-null incident reference). Repeating an action that has
//! already happened is a no-op, never a fault - the UI may issue the
//! same action twice under optimistic concurrency.
//!
//! Manual and automatic escalation are thin call sites over one shared
//! incident-creation core; they differ in title prefix, tag set,
//! notification level and whether the alert is forced to acknowledged.

use chrono::Utc;
use uuid::Uuid;

use super::engine::{AlertEngine, EngineError};
use super::notify::{ActivityEntry, AuditEntry, Notification, NotificationKind};
use super::types::{Alert, AlertPatch, AlertStatus, Incident, IncidentStatus};

/// System actor recorded on engine-driven audit entries
pub const SYSTEM_ACTOR: &str = "system";

/// How an alert is being promoted into an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationKind {
    /// Analyst-requested; the alert is considered triaged
    Manual,
    /// Severity-driven at creation time; triage state untouched
    Auto,
}

impl EscalationKind {
    fn title_prefix(&self) -> &'static str {
        match self {
            EscalationKind::Manual => "Escalated: ",
            EscalationKind::Auto => "Auto-Escalated: ",
        }
    }

    fn tag(&self) -> &'static str {
        match self {
            EscalationKind::Manual => "escalated",
            EscalationKind::Auto => "auto-escalated",
        }
    }

    fn notification_kind(&self) -> NotificationKind {
        match self {
            EscalationKind::Manual => NotificationKind::Warning,
            EscalationKind::Auto => NotificationKind::Critical,
        }
    }

    fn audit_action(&self) -> &'static str {
        match self {
            EscalationKind::Manual => "escalate_alert",
            EscalationKind::Auto => "auto_escalate_alert",
        }
    }
}

impl AlertEngine {
    // ========================================================================
    // ACKNOWLEDGE
    // ========================================================================

    /// Acknowledge a pending alert. Records the acknowledge latency as
    /// a response-time sample. Acknowledging twice is a no-op.
    pub async fn acknowledge(&self, id: Uuid, actor: &str) -> Result<(), EngineError> {
        let _gate = self.write_gate.lock().await;

        let alert = self
            .store
            .get_alert(id)
            .ok_or(EngineError::AlertNotFound(id))?;
        if alert.status != AlertStatus::Pending {
            // Already acknowledged/resolved/dismissed - never backward
            return Ok(());
        }

        let now = Utc::now();
        let latency_secs =
            (now.signed_duration_since(alert.created_at).num_milliseconds() as f64 / 1000.0)
                .max(0.0);
        self.estimator.record_sample(latency_secs);

        let updated = self
            .store
            .modify_alert(id, |a| {
                a.status = AlertStatus::Acknowledged;
                a.acknowledged_at = Some(now);
            })
            .ok_or(EngineError::AlertNotFound(id))?;

        let patch = AlertPatch {
            status: Some(AlertStatus::Acknowledged),
            acknowledged_at: Some(now),
            ..Default::default()
        };
        if let Err(e) = self.persist.update_alert(id, &patch).await {
            // Optimistic local state stays; caller decides how to react
            log::warn!("Acknowledge write failed for alert {}: {}", id, e);
            return Err(e.into());
        }

        self.sink
            .activity(ActivityEntry {
                incident_ref: updated.incident_id,
                kind: "alert_acknowledged".to_string(),
                title: "Alert acknowledged".to_string(),
                description: format!("{} acknowledged \"{}\"", actor, updated.title),
            })
            .await;
        self.sink
            .audit(AuditEntry {
                action: "acknowledge_alert".to_string(),
                entity_type: "alert".to_string(),
                entity_id: id,
                entity_name: updated.title.clone(),
                actor: actor.to_string(),
                details: format!("Response time {:.0}s", latency_secs),
            })
            .await;

        Ok(())
    }

    // ========================================================================
    // RESOLVE
    // ========================================================================

    /// Resolve a pending or acknowledged alert. Resolving a resolved or
    /// dismissed alert is a no-op.
    pub async fn resolve(&self, id: Uuid, actor: &str, method: &str) -> Result<(), EngineError> {
        let _gate = self.write_gate.lock().await;

        let alert = self
            .store
            .get_alert(id)
            .ok_or(EngineError::AlertNotFound(id))?;
        if !alert.status.is_open() {
            return Ok(());
        }

        let now = Utc::now();
        let updated = self
            .store
            .modify_alert(id, |a| {
                a.status = AlertStatus::Resolved;
                a.resolved_at = Some(now);
                a.resolution_method = Some(method.to_string());
            })
            .ok_or(EngineError::AlertNotFound(id))?;

        let patch = AlertPatch {
            status: Some(AlertStatus::Resolved),
            resolved_at: Some(now),
            resolution_method: Some(method.to_string()),
            ..Default::default()
        };
        if let Err(e) = self.persist.update_alert(id, &patch).await {
            log::warn!("Resolve write failed for alert {}: {}", id, e);
            return Err(e.into());
        }

        self.sink
            .notify(Notification {
                kind: NotificationKind::Success,
                title: "Alert resolved".to_string(),
                message: format!("\"{}\" resolved via {}", updated.title, method),
                incident_ref: updated.incident_id,
            })
            .await;
        self.sink
            .activity(ActivityEntry {
                incident_ref: updated.incident_id,
                kind: "alert_resolved".to_string(),
                title: "Alert resolved".to_string(),
                description: format!("{} resolved \"{}\" ({})", actor, updated.title, method),
            })
            .await;
        self.sink
            .audit(AuditEntry {
                action: "resolve_alert".to_string(),
                entity_type: "alert".to_string(),
                entity_id: id,
                entity_name: updated.title.clone(),
                actor: actor.to_string(),
                details: format!("Resolution method: {}", method),
            })
            .await;

        Ok(())
    }

    // ========================================================================
    // DISMISS
    // ========================================================================

    /// Dismiss a pending or acknowledged alert. Idempotent like the
    /// other actions; never reverts resolved alerts.
    pub async fn dismiss(&self, id: Uuid, actor: &str) -> Result<(), EngineError> {
        let _gate = self.write_gate.lock().await;

        let alert = self
            .store
            .get_alert(id)
            .ok_or(EngineError::AlertNotFound(id))?;
        if !alert.status.is_open() {
            return Ok(());
        }

        let updated = self
            .store
            .modify_alert(id, |a| a.status = AlertStatus::Dismissed)
            .ok_or(EngineError::AlertNotFound(id))?;

        let patch = AlertPatch {
            status: Some(AlertStatus::Dismissed),
            ..Default::default()
        };
        if let Err(e) = self.persist.update_alert(id, &patch).await {
            log::warn!("Dismiss write failed for alert {}: {}", id, e);
            return Err(e.into());
        }

        self.sink
            .audit(AuditEntry {
                action: "dismiss_alert".to_string(),
                entity_type: "alert".to_string(),
                entity_id: id,
                entity_name: updated.title,
                actor: actor.to_string(),
                details: String::new(),
            })
            .await;

        Ok(())
    }

    // ========================================================================
    // ESCALATION
    // ========================================================================

    /// Promote an alert into a new incident on analyst demand. Returns
    /// the incident id; escalating an already-escalated alert returns
    /// the existing incident id without creating a second incident.
    pub async fn escalate_to_incident(&self, id: Uuid, actor: &str) -> Result<Uuid, EngineError> {
        self.escalate(id, actor, EscalationKind::Manual).await
    }

    /// Severity-driven promotion, invoked by the pipeline for critical
    /// alerts. Same core routine as manual escalation.
    pub(crate) async fn auto_escalate(&self, id: Uuid) -> Result<Uuid, EngineError> {
        self.escalate(id, SYSTEM_ACTOR, EscalationKind::Auto).await
    }

    async fn escalate(
        &self,
        id: Uuid,
        actor: &str,
        kind: EscalationKind,
    ) -> Result<Uuid, EngineError> {
        let _gate = self.write_gate.lock().await;

        let alert = self
            .store
            .get_alert(id)
            .ok_or(EngineError::AlertNotFound(id))?;

        // Escalation is irreversible and idempotent
        if let Some(existing) = alert.incident_id {
            return Ok(existing);
        }

        let case_number = self.case_numbers.next_case_number().await?;

        // The allocator call suspended; a streamed escalation from
        // another client may have linked the alert in the meantime.
        // Honor that incident instead of opening a second one.
        let alert = self
            .store
            .get_alert(id)
            .ok_or(EngineError::AlertNotFound(id))?;
        if let Some(existing) = alert.incident_id {
            return Ok(existing);
        }

        let incident = Incident {
            id: Uuid::new_v4(),
            case_number: case_number.clone(),
            title: format!("{}{}", kind.title_prefix(), alert.title),
            description: alert.description.clone(),
            severity: alert.severity,
            status: IncidentStatus::Open,
            tags: vec![alert.source.clone(), kind.tag().to_string()],
            alert_count: 1,
            created_at: Utc::now(),
        };

        // If this write fails the alert stays unescalated and unmodified
        self.persist.insert_incident(&incident).await?;

        let linked = self.link_alert(&alert, incident.id, kind).await?;

        log::info!(
            "Alert {} escalated to incident {} ({})",
            id,
            case_number,
            kind.tag()
        );

        self.sink
            .notify(Notification {
                kind: kind.notification_kind(),
                title: format!("Incident {} created", case_number),
                message: format!("\"{}\" escalated to incident {}", linked.title, case_number),
                incident_ref: Some(incident.id),
            })
            .await;
        self.sink
            .activity(ActivityEntry {
                incident_ref: Some(incident.id),
                kind: "alert_escalated".to_string(),
                title: format!("Incident {} opened", case_number),
                description: format!("Created from alert \"{}\"", linked.title),
            })
            .await;
        self.sink
            .audit(AuditEntry {
                action: kind.audit_action().to_string(),
                entity_type: "incident".to_string(),
                entity_id: incident.id,
                entity_name: case_number,
                actor: actor.to_string(),
                details: format!("Source alert {}", id),
            })
            .await;

        Ok(incident.id)
    }

    /// Set the incident reference (and for manual escalation force the
    /// alert to acknowledged - the analyst has clearly seen it).
    async fn link_alert(
        &self,
        alert: &Alert,
        incident_id: Uuid,
        kind: EscalationKind,
    ) -> Result<Alert, EngineError> {
        let now = Utc::now();
        let force_ack = kind == EscalationKind::Manual && alert.status == AlertStatus::Pending;

        let updated = self
            .store
            .modify_alert(alert.id, |a| {
                a.incident_id = Some(incident_id);
                if force_ack {
                    a.status = AlertStatus::Acknowledged;
                    a.acknowledged_at = Some(now);
                }
            })
            .ok_or(EngineError::AlertNotFound(alert.id))?;

        let patch = AlertPatch {
            incident_id: Some(incident_id),
            status: force_ack.then_some(AlertStatus::Acknowledged),
            acknowledged_at: force_ack.then_some(now),
            ..Default::default()
        };
        if let Err(e) = self.persist.update_alert(alert.id, &patch).await {
            log::warn!("Incident link write failed for alert {}: {}", alert.id, e);
            return Err(e.into());
        }

        Ok(updated)
    }
}

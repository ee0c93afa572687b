//! Core Alert Lifecycle Types
//!
//! Data structures only - no logic. Everything here is what the
//! Persistent Store holds and the UI shell renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ============================================================================
// SEVERITY
// ============================================================================

/// Severity assigned by the Risk Analysis Service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    /// Higher = more urgent
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 4,
            Severity::High => 3,
            Severity::Medium => 2,
            Severity::Low => 1,
            Severity::Info => 0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ALERT
// ============================================================================

/// Alert triage status. Transitions are monotonic forward only:
/// pending -> acknowledged -> resolved, or pending|acknowledged -> dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Dismissed => "dismissed",
        }
    }

    /// Whether the alert is still awaiting triage
    pub fn is_open(&self) -> bool {
        matches!(self, AlertStatus::Pending | AlertStatus::Acknowledged)
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single detected security event awaiting triage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    /// Set once by escalation, never cleared
    pub incident_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    /// Source label, e.g. "SIEM Correlation" or "EDR Sensor"
    pub source: String,
    pub severity: Severity,
    pub status: AlertStatus,
    /// Free text, set on resolve
    pub resolution_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Scenario-specific synthetic attributes plus the attached analysis result
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Partial update for an alert row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertPatch {
    pub status: Option<AlertStatus>,
    pub incident_id: Option<Uuid>,
    pub resolution_method: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AlertPatch {
    /// Apply this patch onto an alert in place
    pub fn apply_to(&self, alert: &mut Alert) {
        if let Some(status) = self.status {
            alert.status = status;
        }
        if let Some(incident_id) = self.incident_id {
            alert.incident_id = Some(incident_id);
        }
        if let Some(method) = &self.resolution_method {
            alert.resolution_method = Some(method.clone());
        }
        if let Some(ts) = self.acknowledged_at {
            alert.acknowledged_at = Some(ts);
        }
        if let Some(ts) = self.resolved_at {
            alert.resolved_at = Some(ts);
        }
    }
}

// ============================================================================
// EVIDENCE
// ============================================================================

/// Forensic artifact type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceType {
    File,
    Hash,
    Url,
    Ip,
    Domain,
    Email,
    Other,
}

impl EvidenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceType::File => "file",
            EvidenceType::Hash => "hash",
            EvidenceType::Url => "url",
            EvidenceType::Ip => "ip",
            EvidenceType::Domain => "domain",
            EvidenceType::Email => "email",
            EvidenceType::Other => "other",
        }
    }
}

/// Evidence classification at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceClass {
    Malicious,
    Suspicious,
    Benign,
    Unknown,
}

impl EvidenceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceClass::Malicious => "malicious",
            EvidenceClass::Suspicious => "suspicious",
            EvidenceClass::Benign => "benign",
            EvidenceClass::Unknown => "unknown",
        }
    }

    /// Classification consistent with the severity of the producing alert
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => EvidenceClass::Malicious,
            Severity::High => EvidenceClass::Suspicious,
            _ => EvidenceClass::Unknown,
        }
    }
}

/// A forensic artifact associated with an alert/incident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Uuid,
    pub incident_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: EvidenceType,
    pub value: String,
    pub description: String,
    pub classification: EvidenceClass,
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// INCIDENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Contained,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "open",
            IncidentStatus::Investigating => "investigating",
            IncidentStatus::Contained => "contained",
            IncidentStatus::Closed => "closed",
        }
    }
}

/// Aggregating case record created from one or more alerts.
/// Owned by an external collaborator; this engine only creates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub case_number: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub tags: Vec<String>,
    pub alert_count: u32,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// CHANGE STREAM
// ============================================================================

/// Operation kind on the Persistent Store's change-stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Streamed change to the alerts table
#[derive(Debug, Clone)]
pub struct AlertChange {
    pub op: ChangeOp,
    pub record: Alert,
}

/// Streamed change to the evidence table
#[derive(Debug, Clone)]
pub struct EvidenceChange {
    pub op: ChangeOp,
    pub record: Evidence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical.rank() > Severity::High.rank());
        assert!(Severity::High.rank() > Severity::Medium.rank());
        assert!(Severity::Low.rank() > Severity::Info.rank());
    }

    #[test]
    fn test_severity_serde_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let back: Severity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(back, Severity::High);
    }

    #[test]
    fn test_evidence_class_from_severity() {
        assert_eq!(
            EvidenceClass::from_severity(Severity::Critical),
            EvidenceClass::Malicious
        );
        assert_eq!(
            EvidenceClass::from_severity(Severity::High),
            EvidenceClass::Suspicious
        );
        assert_eq!(
            EvidenceClass::from_severity(Severity::Medium),
            EvidenceClass::Unknown
        );
        assert_eq!(
            EvidenceClass::from_severity(Severity::Info),
            EvidenceClass::Unknown
        );
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut alert = Alert {
            id: Uuid::new_v4(),
            incident_id: None,
            title: "t".to_string(),
            description: "d".to_string(),
            source: "s".to_string(),
            severity: Severity::Low,
            status: AlertStatus::Pending,
            resolution_method: None,
            created_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            attributes: Map::new(),
        };

        let patch = AlertPatch {
            status: Some(AlertStatus::Acknowledged),
            acknowledged_at: Some(Utc::now()),
            ..Default::default()
        };
        patch.apply_to(&mut alert);

        assert_eq!(alert.status, AlertStatus::Acknowledged);
        assert!(alert.acknowledged_at.is_some());
        assert!(alert.incident_id.is_none());
        assert!(alert.resolution_method.is_none());
    }
}

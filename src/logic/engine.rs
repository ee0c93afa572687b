//! Alert Engine
//!
//! Composition root for the alert lifecycle: owns the in-memory store,
//! the response-time estimator and the audio guard, and talks to the
//! three external collaborators (Risk Analysis Service, Persistent
//! Store, Notification Sink) plus the case-number allocator.
//!
//! Pipeline per cycle: generate -> classify -> persist alert+evidence
//! -> notify -> auto-escalate when critical.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::constants;

use super::notify::{AudioCue, AudioGuard, Notification, NotificationKind, NotificationSink};
use super::persist::{CaseNumberAllocator, PersistentStore, StoreError};
use super::response_time::ResponseTimeEstimator;
use super::risk::{self, RiskAnalysisService};
use super::store::AlertStore;
use super::synthetic::{self, CandidateEvent};
use super::types::{Alert, AlertStatus, Evidence, EvidenceClass, EvidenceType, Severity};

// ============================================================================
// CONFIG & ERRORS
// ============================================================================

/// Engine tunables. Defaults come from `constants`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub seed_limit: usize,
    pub classify_deadline: Duration,
    pub noise_evidence_probability: f64,
    pub cycle_min: Duration,
    pub cycle_max: Duration,
    pub estimate_refresh: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed_limit: constants::SEED_LIMIT,
            classify_deadline: Duration::from_secs(constants::get_classify_deadline_secs()),
            noise_evidence_probability: constants::NOISE_EVIDENCE_PROBABILITY,
            cycle_min: Duration::from_secs(constants::CYCLE_MIN_SECS),
            cycle_max: Duration::from_secs(constants::CYCLE_MAX_SECS),
            estimate_refresh: Duration::from_secs(constants::ESTIMATE_REFRESH_SECS),
        }
    }
}

/// Failures surfaced to user-initiated actions. Background failures are
/// logged and never reach a caller.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("alert {0} not found")]
    AlertNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Dashboard summary for the UI shell
#[derive(Debug, Clone, Serialize)]
pub struct EngineMetrics {
    pub total_alerts: usize,
    pub pending: usize,
    pub acknowledged: usize,
    pub resolved: usize,
    pub dismissed: usize,
    pub critical_open: usize,
    pub response_time_display: String,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct AlertEngine {
    pub(crate) persist: Arc<dyn PersistentStore>,
    pub(crate) risk: Arc<dyn RiskAnalysisService>,
    pub(crate) sink: Arc<dyn NotificationSink>,
    pub(crate) case_numbers: Arc<dyn CaseNumberAllocator>,
    pub(crate) store: AlertStore,
    pub(crate) estimator: ResponseTimeEstimator,
    pub(crate) audio: AudioGuard,
    pub(crate) config: EngineConfig,
    /// Serializes all record mutation: pipeline, change-stream
    /// application and user actions - single writer at a time.
    pub(crate) write_gate: tokio::sync::Mutex<()>,
}

impl AlertEngine {
    pub fn new(
        persist: Arc<dyn PersistentStore>,
        risk: Arc<dyn RiskAnalysisService>,
        sink: Arc<dyn NotificationSink>,
        case_numbers: Arc<dyn CaseNumberAllocator>,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            persist,
            risk,
            sink,
            case_numbers,
            store: AlertStore::new(),
            estimator: ResponseTimeEstimator::new(),
            audio: AudioGuard::new(),
            config,
            write_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    pub fn estimator(&self) -> &ResponseTimeEstimator {
        &self.estimator
    }

    pub fn audio(&self) -> &AudioGuard {
        &self.audio
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // STARTUP
    // ========================================================================

    /// Initial bulk load: the most recent N alerts and evidence records
    pub async fn load_initial(&self) -> Result<(), EngineError> {
        let alerts = self.persist.select_recent_alerts(self.config.seed_limit).await?;
        let evidence = self
            .persist
            .select_recent_evidence(self.config.seed_limit)
            .await?;

        log::info!(
            "Seeded alert store: {} alerts, {} evidence records",
            alerts.len(),
            evidence.len()
        );
        self.store.seed(alerts, evidence);
        Ok(())
    }

    /// Spawn the change-stream listener. Runs until the store closes
    /// both streams; a single closed stream keeps the other draining.
    /// Events per record id apply in arrival order, and each change is
    /// applied under the write gate so it never interleaves with an
    /// in-flight pipeline run or user action.
    pub fn spawn_change_stream(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        let mut alerts_rx = self.persist.subscribe_alerts();
        let mut evidence_rx = self.persist.subscribe_evidence();

        tokio::spawn(async move {
            let mut alerts_open = true;
            let mut evidence_open = true;
            while alerts_open || evidence_open {
                tokio::select! {
                    change = alerts_rx.recv(), if alerts_open => match change {
                        Some(change) => {
                            let _gate = engine.write_gate.lock().await;
                            engine.store.apply_alert_change(change);
                        }
                        None => alerts_open = false,
                    },
                    change = evidence_rx.recv(), if evidence_open => match change {
                        Some(change) => {
                            let _gate = engine.write_gate.lock().await;
                            engine.store.apply_evidence_change(change);
                        }
                        None => evidence_open = false,
                    },
                }
            }
            log::debug!("Change-stream listener stopped");
        })
    }

    // ========================================================================
    // PIPELINE
    // ========================================================================

    /// One full pipeline cycle. Background path: every failure is
    /// logged and swallowed; the scheduler simply tries again next
    /// cycle.
    pub async fn run_cycle(&self) {
        let candidate = synthetic::generate();
        self.process_candidate(candidate).await;
    }

    pub(crate) async fn process_candidate(&self, mut candidate: CandidateEvent) {
        let classification = match risk::classify(
            self.risk.as_ref(),
            &mut candidate,
            self.config.classify_deadline,
        )
        .await
        {
            Some(classification) => classification,
            // Deliberate policy: no trustworthy severity, no alert
            None => return,
        };

        let severity = classification.severity;
        let now = Utc::now();

        let alert = Alert {
            id: Uuid::new_v4(),
            incident_id: None,
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            source: candidate.source.clone(),
            severity,
            status: AlertStatus::Pending,
            resolution_method: None,
            created_at: now,
            acknowledged_at: None,
            resolved_at: None,
            attributes: candidate.attributes.clone(),
        };

        let evidence = Evidence {
            id: Uuid::new_v4(),
            incident_id: None,
            kind: candidate.evidence_kind,
            value: candidate.evidence_value.clone(),
            description: candidate.evidence_description.clone(),
            classification: EvidenceClass::from_severity(severity),
            image_ref: None,
            created_at: now,
        };

        {
            let _gate = self.write_gate.lock().await;

            // Optimistic local insert first; the streamed echo with the
            // same id is suppressed by the store.
            self.store.insert_alert(alert.clone());
            if let Err(e) = self.persist.insert_alert(&alert).await {
                log::warn!("Alert insert failed, cycle aborted: {}", e);
                return;
            }

            // The alert row is already durable here; a failed evidence
            // write downgrades to a log line so it never suppresses the
            // alert's notification or auto-escalation.
            self.store.insert_evidence(evidence.clone());
            if let Err(e) = self.persist.insert_evidence(&evidence).await {
                log::warn!("Evidence insert failed for alert {}: {}", alert.id, e);
            }

            if let Some(noise) = self.maybe_noise_evidence() {
                self.store.insert_evidence(noise.clone());
                if let Err(e) = self.persist.insert_evidence(&noise).await {
                    log::warn!("Noise evidence insert failed: {}", e);
                }
            }
        }

        log::info!(
            "New {} alert stored: {} ({})",
            severity,
            alert.title,
            candidate.scenario
        );

        self.sink
            .notify(Notification {
                kind: NotificationKind::for_severity(severity),
                title: format!("New alert: {}", alert.title),
                message: alert.description.clone(),
                incident_ref: None,
            })
            .await;

        if matches!(severity, Severity::Critical | Severity::High) {
            self.audio
                .request_cue(
                    self.sink.as_ref(),
                    AudioCue {
                        severity,
                        phrase: format!("{} severity alert. {}", severity, alert.title),
                    },
                )
                .await;
        }

        if severity == Severity::Critical {
            // Failure here never blocks alert creation
            if let Err(e) = self.auto_escalate(alert.id).await {
                log::warn!("Auto-escalation failed for alert {}: {}", alert.id, e);
            }
        }
    }

    /// Occasionally produce one unrelated benign evidence record so the
    /// evidence table is not wall-to-wall malicious artifacts.
    fn maybe_noise_evidence(&self) -> Option<Evidence> {
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(self.config.noise_evidence_probability) {
            return None;
        }

        let domains = [
            "cdn.vendor-updates.com",
            "telemetry.os-vendor.net",
            "mirror.pkg-registry.org",
            "sso.partner-portal.io",
        ];
        let value = domains[rng.gen_range(0..domains.len())].to_string();

        Some(Evidence {
            id: Uuid::new_v4(),
            incident_id: None,
            kind: EvidenceType::Domain,
            value,
            description: "Routine artifact observed during collection".to_string(),
            classification: EvidenceClass::Benign,
            image_ref: None,
            created_at: Utc::now(),
        })
    }

    // ========================================================================
    // METRICS
    // ========================================================================

    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            total_alerts: self.store.alert_count(),
            pending: self.store.count_by_status(AlertStatus::Pending),
            acknowledged: self.store.count_by_status(AlertStatus::Acknowledged),
            resolved: self.store.count_by_status(AlertStatus::Resolved),
            dismissed: self.store.count_by_status(AlertStatus::Dismissed),
            critical_open: self.store.count_open_by_severity(Severity::Critical),
            response_time_display: self.estimator.display(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::notify::testing::RecordingSink;
    use crate::logic::persist::memory::MemoryStore;
    use crate::logic::persist::SequenceAllocator;
    use crate::logic::risk::testing::{FailingRiskService, FixedRiskService};
    use crate::logic::synthetic::Scenario;
    use crate::logic::types::{AlertChange, ChangeOp, IncidentStatus};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Harness {
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        engine: Arc<AlertEngine>,
    }

    fn harness(risk: Arc<dyn RiskAnalysisService>) -> Harness {
        harness_with_allocator(risk, Arc::new(SequenceAllocator::new("CASE")))
    }

    fn harness_with_allocator(
        risk: Arc<dyn RiskAnalysisService>,
        case_numbers: Arc<dyn CaseNumberAllocator>,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::new());
        let engine = AlertEngine::new(
            store.clone(),
            risk,
            sink.clone(),
            case_numbers,
            EngineConfig {
                noise_evidence_probability: 0.0,
                ..Default::default()
            },
        );
        Harness {
            store,
            sink,
            engine,
        }
    }

    /// Allocator whose call suspends long enough for another writer to
    /// sneak in between snapshot and incident insert
    struct SlowAllocator {
        inner: SequenceAllocator,
        delay: Duration,
    }

    #[async_trait]
    impl CaseNumberAllocator for SlowAllocator {
        async fn next_case_number(&self) -> Result<String, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.next_case_number().await
        }
    }

    fn remote_alert() -> Alert {
        Alert {
            id: Uuid::new_v4(),
            incident_id: None,
            title: "remote".to_string(),
            description: "written by another client".to_string(),
            source: "Log Ingestion".to_string(),
            severity: Severity::Medium,
            status: AlertStatus::Pending,
            resolution_method: None,
            created_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            attributes: serde_json::Map::new(),
        }
    }

    /// Store whose evidence stream is closed from the start
    struct ClosedEvidenceStream(Arc<MemoryStore>);

    #[async_trait]
    impl PersistentStore for ClosedEvidenceStream {
        async fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
            self.0.insert_alert(alert).await
        }

        async fn update_alert(
            &self,
            id: Uuid,
            patch: &crate::logic::types::AlertPatch,
        ) -> Result<(), StoreError> {
            self.0.update_alert(id, patch).await
        }

        async fn select_recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, StoreError> {
            self.0.select_recent_alerts(limit).await
        }

        async fn insert_evidence(&self, evidence: &Evidence) -> Result<(), StoreError> {
            self.0.insert_evidence(evidence).await
        }

        async fn select_recent_evidence(&self, limit: usize) -> Result<Vec<Evidence>, StoreError> {
            self.0.select_recent_evidence(limit).await
        }

        async fn insert_incident(
            &self,
            incident: &crate::logic::types::Incident,
        ) -> Result<(), StoreError> {
            self.0.insert_incident(incident).await
        }

        fn subscribe_alerts(&self) -> tokio::sync::mpsc::UnboundedReceiver<AlertChange> {
            self.0.subscribe_alerts()
        }

        fn subscribe_evidence(
            &self,
        ) -> tokio::sync::mpsc::UnboundedReceiver<crate::logic::types::EvidenceChange> {
            let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
            rx
        }
    }

    fn candidate(scenario: Scenario) -> CandidateEvent {
        synthetic::generate_scenario(&mut StdRng::seed_from_u64(99), scenario)
    }

    #[tokio::test]
    async fn test_critical_ransomware_auto_escalates() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Critical, 0.98)));

        h.engine
            .process_candidate(candidate(Scenario::Ransomware))
            .await;

        // Alert stored, still awaiting triage
        let alerts = h.engine.store().alerts();
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.status, AlertStatus::Pending);

        // Evidence classified consistently with severity
        let evidence = h.engine.store().evidence();
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].classification, EvidenceClass::Malicious);

        // Incident opened in the same cycle, alert linked
        let incidents = h.store.incidents();
        assert_eq!(incidents.len(), 1);
        let incident = &incidents[0];
        assert_eq!(incident.status, IncidentStatus::Open);
        assert_eq!(incident.severity, Severity::Critical);
        assert!(incident.tags.iter().any(|t| t == "auto-escalated"));
        assert_eq!(alert.incident_id, Some(incident.id));
        assert_eq!(incident.alert_count, 1);

        // Critical notification for the escalation was emitted
        let notifications = h.sink.notifications.lock();
        assert!(notifications
            .iter()
            .any(|n| n.kind == NotificationKind::Critical
                && n.title.contains(&incident.case_number)));
    }

    #[tokio::test]
    async fn test_unscored_response_creates_nothing() {
        let h = harness(Arc::new(crate::logic::risk::testing::FixedRiskService::unscored()));

        h.engine
            .process_candidate(candidate(Scenario::Phishing))
            .await;

        assert_eq!(h.engine.store().alert_count(), 0);
        assert_eq!(h.store.alert_count(), 0);
        assert_eq!(h.store.evidence_count(), 0);
        assert!(h.store.incidents().is_empty());
        assert!(h.sink.notifications.lock().is_empty());
    }

    #[tokio::test]
    async fn test_classifier_failure_creates_nothing() {
        let h = harness(Arc::new(FailingRiskService));

        h.engine
            .process_candidate(candidate(Scenario::Malware))
            .await;

        assert_eq!(h.store.alert_count(), 0);
        assert_eq!(h.store.evidence_count(), 0);
    }

    #[tokio::test]
    async fn test_medium_severity_does_not_escalate() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Medium, 0.5)));

        h.engine
            .process_candidate(candidate(Scenario::BruteForce))
            .await;

        assert_eq!(h.engine.store().alert_count(), 1);
        assert!(h.store.incidents().is_empty());
        // Medium alerts do not request an audio cue
        assert!(h.sink.cues.lock().is_empty());
    }

    #[tokio::test]
    async fn test_high_severity_requests_audio_cue() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::High, 0.8)));

        h.engine
            .process_candidate(candidate(Scenario::Exfiltration))
            .await;

        assert_eq!(h.sink.cues.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_alert_insert_failure_aborts_cycle() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::High, 0.8)));
        h.store.set_fail_alert_writes(true);

        h.engine
            .process_candidate(candidate(Scenario::Malware))
            .await;

        assert_eq!(h.store.alert_count(), 0);
        assert_eq!(h.store.evidence_count(), 0);
        // Background failure never surfaces as a notification
        assert!(h.sink.notifications.lock().is_empty());
    }

    #[tokio::test]
    async fn test_incident_write_failure_leaves_alert_unescalated() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Critical, 0.99)));
        h.store.set_fail_incident_writes(true);

        h.engine
            .process_candidate(candidate(Scenario::Ransomware))
            .await;

        // Alert still created as an unescalated critical alert
        let alerts = h.engine.store().alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert!(alerts[0].incident_id.is_none());
        assert!(h.store.incidents().is_empty());
    }

    #[tokio::test]
    async fn test_own_stream_echo_is_not_duplicated() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Low, 0.2)));
        let listener = h.engine.spawn_change_stream();

        h.engine
            .process_candidate(candidate(Scenario::LoginAnomaly))
            .await;

        // Let the echoed insert arrive
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.engine.store().alert_count(), 1);
        drop(h);
        listener.abort();
    }

    #[tokio::test]
    async fn test_remote_insert_arrives_via_stream() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Low, 0.2)));
        let listener = h.engine.spawn_change_stream();

        let mut remote = remote_alert();
        h.store.emit_alert_change(AlertChange {
            op: ChangeOp::Insert,
            record: remote.clone(),
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.engine.store().alert_count(), 1);

        // Server-confirmed update replaces the local copy wholesale
        remote.status = AlertStatus::Acknowledged;
        h.store.emit_alert_change(AlertChange {
            op: ChangeOp::Update,
            record: remote.clone(),
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            h.engine.store().get_alert(remote.id).unwrap().status,
            AlertStatus::Acknowledged
        );

        listener.abort();
    }

    #[tokio::test]
    async fn test_load_initial_is_bounded() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Low, 0.1)));

        // More pipeline cycles than the seed limit would be slow; write
        // rows straight into the backend instead.
        for i in 0..150 {
            let alert = Alert {
                id: Uuid::new_v4(),
                incident_id: None,
                title: format!("seed-{}", i),
                description: "d".to_string(),
                source: "s".to_string(),
                severity: Severity::Info,
                status: AlertStatus::Pending,
                resolution_method: None,
                created_at: Utc::now() - chrono::Duration::seconds(i),
                acknowledged_at: None,
                resolved_at: None,
                attributes: serde_json::Map::new(),
            };
            h.store.insert_alert(&alert).await.unwrap();
        }

        h.engine.load_initial().await.unwrap();
        assert_eq!(h.engine.store().alert_count(), constants::SEED_LIMIT);
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Medium, 0.5)));
        h.engine
            .process_candidate(candidate(Scenario::UnauthorizedAccess))
            .await;
        let id = h.engine.store().alerts()[0].id;

        h.engine.acknowledge(id, "analyst1").await.unwrap();
        h.engine.acknowledge(id, "analyst1").await.unwrap();

        // Exactly one response-time sample, status stays acknowledged
        assert_eq!(h.engine.estimator().sample_count(), 1);
        let alert = h.engine.store().get_alert(id).unwrap();
        assert_eq!(alert.status, AlertStatus::Acknowledged);
        assert!(alert.acknowledged_at.is_some());
    }

    #[tokio::test]
    async fn test_resolve_after_dismiss_is_a_no_op() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Low, 0.2)));
        h.engine
            .process_candidate(candidate(Scenario::Cryptomining))
            .await;
        let id = h.engine.store().alerts()[0].id;

        h.engine.dismiss(id, "analyst1").await.unwrap();
        h.engine.resolve(id, "analyst1", "manual review").await.unwrap();

        let alert = h.engine.store().get_alert(id).unwrap();
        assert_eq!(alert.status, AlertStatus::Dismissed);
        assert!(alert.resolved_at.is_none());
    }

    #[tokio::test]
    async fn test_resolve_records_method_and_notifies() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Medium, 0.5)));
        h.engine
            .process_candidate(candidate(Scenario::Phishing))
            .await;
        let id = h.engine.store().alerts()[0].id;

        h.engine
            .resolve(id, "analyst2", "blocked sender domain")
            .await
            .unwrap();

        let alert = h.engine.store().get_alert(id).unwrap();
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert_eq!(
            alert.resolution_method.as_deref(),
            Some("blocked sender domain")
        );
        assert!(h
            .sink
            .notifications
            .lock()
            .iter()
            .any(|n| n.kind == NotificationKind::Success));
    }

    #[tokio::test]
    async fn test_manual_escalation_is_idempotent() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::High, 0.85)));
        h.engine
            .process_candidate(candidate(Scenario::Exfiltration))
            .await;
        let id = h.engine.store().alerts()[0].id;

        let first = h.engine.escalate_to_incident(id, "analyst1").await.unwrap();
        let second = h.engine.escalate_to_incident(id, "analyst1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.store.incidents().len(), 1);

        // Manual escalation forces the alert to acknowledged
        let alert = h.engine.store().get_alert(id).unwrap();
        assert_eq!(alert.status, AlertStatus::Acknowledged);
        assert_eq!(alert.incident_id, Some(first));

        let incident = &h.store.incidents()[0];
        assert!(incident.title.starts_with("Escalated: "));
        assert!(incident.tags.iter().any(|t| t == "escalated"));
    }

    #[tokio::test]
    async fn test_streamed_escalation_mid_escalate_is_honored() {
        let h = harness_with_allocator(
            Arc::new(FixedRiskService::scoring(Severity::High, 0.85)),
            Arc::new(SlowAllocator {
                inner: SequenceAllocator::new("CASE"),
                delay: Duration::from_millis(200),
            }),
        );
        h.engine
            .process_candidate(candidate(Scenario::Exfiltration))
            .await;
        let id = h.engine.store().alerts()[0].id;
        let remote_incident = Uuid::new_v4();

        let engine = h.engine.clone();
        let escalate =
            tokio::spawn(async move { engine.escalate_to_incident(id, "analyst1").await });

        // While the allocator call is suspended, a remote client links
        // the alert and the update streams in
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut record = h.engine.store().get_alert(id).unwrap();
        record.incident_id = Some(remote_incident);
        h.engine.store().apply_alert_change(AlertChange {
            op: ChangeOp::Update,
            record,
        });

        let result = escalate.await.unwrap().unwrap();
        assert_eq!(result, remote_incident, "existing incident must win");
        assert!(
            h.store.incidents().is_empty(),
            "no second incident for an already-escalated alert"
        );
    }

    #[tokio::test]
    async fn test_streamed_resolve_is_not_clobbered_by_escalation() {
        let h = harness_with_allocator(
            Arc::new(FixedRiskService::scoring(Severity::High, 0.85)),
            Arc::new(SlowAllocator {
                inner: SequenceAllocator::new("CASE"),
                delay: Duration::from_millis(200),
            }),
        );
        h.engine
            .process_candidate(candidate(Scenario::Malware))
            .await;
        let id = h.engine.store().alerts()[0].id;

        let engine = h.engine.clone();
        let escalate =
            tokio::spawn(async move { engine.escalate_to_incident(id, "analyst1").await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Remote resolve lands while the escalation awaits its case
        // number; the link step must not force the alert back to
        // acknowledged off a stale snapshot
        let mut record = h.engine.store().get_alert(id).unwrap();
        record.status = AlertStatus::Resolved;
        record.resolved_at = Some(Utc::now());
        h.engine.store().apply_alert_change(AlertChange {
            op: ChangeOp::Update,
            record,
        });

        let incident_id = escalate.await.unwrap().unwrap();
        let alert = h.engine.store().get_alert(id).unwrap();
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert_eq!(alert.incident_id, Some(incident_id));
    }

    #[tokio::test]
    async fn test_listener_waits_for_write_gate() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Low, 0.2)));
        let listener = h.engine.spawn_change_stream();

        let gate = h.engine.write_gate.lock().await;
        h.store.emit_alert_change(AlertChange {
            op: ChangeOp::Insert,
            record: remote_alert(),
        });

        // Held gate keeps the streamed change pending
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.engine.store().alert_count(), 0);

        drop(gate);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.engine.store().alert_count(), 1);

        listener.abort();
    }

    #[tokio::test]
    async fn test_listener_survives_one_closed_stream() {
        let inner = Arc::new(MemoryStore::new());
        let engine = AlertEngine::new(
            Arc::new(ClosedEvidenceStream(inner.clone())),
            Arc::new(FixedRiskService::scoring(Severity::Low, 0.2)),
            Arc::new(RecordingSink::new()),
            Arc::new(SequenceAllocator::new("CASE")),
            EngineConfig::default(),
        );
        let listener = engine.spawn_change_stream();

        // Evidence stream closed immediately; alert changes still flow
        tokio::time::sleep(Duration::from_millis(50)).await;
        inner.emit_alert_change(AlertChange {
            op: ChangeOp::Insert,
            record: remote_alert(),
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(engine.store().alert_count(), 1);
        listener.abort();
    }

    #[tokio::test]
    async fn test_failed_manual_escalation_returns_error() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::High, 0.85)));
        h.engine
            .process_candidate(candidate(Scenario::Malware))
            .await;
        let id = h.engine.store().alerts()[0].id;

        h.store.set_fail_incident_writes(true);
        let result = h.engine.escalate_to_incident(id, "analyst1").await;
        assert!(matches!(result, Err(EngineError::Store(_))));

        // Alert left unescalated and unmodified
        let alert = h.engine.store().get_alert(id).unwrap();
        assert!(alert.incident_id.is_none());
        assert_eq!(alert.status, AlertStatus::Pending);
    }

    #[tokio::test]
    async fn test_action_on_unknown_alert_is_not_found() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Low, 0.2)));
        let missing = Uuid::new_v4();
        let result = h.engine.acknowledge(missing, "analyst1").await;
        assert!(matches!(result, Err(EngineError::AlertNotFound(_))));
    }

    #[tokio::test]
    async fn test_metrics_reflect_store() {
        let h = harness(Arc::new(FixedRiskService::scoring(Severity::Critical, 0.99)));
        h.engine
            .process_candidate(candidate(Scenario::Ransomware))
            .await;

        let metrics = h.engine.metrics();
        assert_eq!(metrics.total_alerts, 1);
        assert_eq!(metrics.pending, 1);
        assert_eq!(metrics.critical_open, 1);
        assert!(!metrics.response_time_display.is_empty());
    }
}

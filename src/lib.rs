//! SOC Alert Lifecycle Engine
//!
//! Background engine behind the SOC dashboard: synthesizes candidate
//! security events, has them risk-scored by an external service,
//! persists and reconciles alerts against a live change-stream,
//! maintains a continuously-updating response-time estimate, and
//! auto-promotes critical alerts into incidents.
//!
//! The UI shell wires the external collaborators and drives user
//! actions:
//!
//! ```no_run
//! use std::sync::Arc;
//! use soc_alert_core::logic::engine::{AlertEngine, EngineConfig};
//! use soc_alert_core::logic::persist::{memory::MemoryStore, SequenceAllocator};
//! use soc_alert_core::logic::risk::{HttpRiskService, RiskServiceConfig};
//! use soc_alert_core::logic::scheduler::Scheduler;
//! # use soc_alert_core::logic::notify::{NotificationSink, Notification, AuditEntry, ActivityEntry, AudioCue};
//! # struct ShellSink;
//! # #[async_trait::async_trait]
//! # impl NotificationSink for ShellSink {
//! #     async fn notify(&self, _: Notification) {}
//! #     async fn audit(&self, _: AuditEntry) {}
//! #     async fn activity(&self, _: ActivityEntry) {}
//! #     async fn play_cue(&self, _: AudioCue) -> Result<(), String> { Ok(()) }
//! # }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let risk = HttpRiskService::new(RiskServiceConfig::default())?;
//! let engine = AlertEngine::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(risk),
//!     Arc::new(ShellSink),
//!     Arc::new(SequenceAllocator::new("CASE")),
//!     EngineConfig::default(),
//! );
//!
//! engine.load_initial().await?;
//! engine.spawn_change_stream();
//!
//! let scheduler = Scheduler::new(engine.clone());
//! scheduler.start();
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod logic;

pub use logic::engine::{AlertEngine, EngineConfig, EngineError, EngineMetrics};
pub use logic::escalation::EscalationKind;
pub use logic::notify::{
    ActivityEntry, AudioCue, AudioGuard, AuditEntry, Notification, NotificationKind,
    NotificationSink,
};
pub use logic::persist::{CaseNumberAllocator, PersistentStore, StoreError};
pub use logic::risk::{Classification, RiskAnalysisService, RiskError};
pub use logic::scheduler::Scheduler;
pub use logic::types::{
    Alert, AlertPatch, AlertStatus, ChangeOp, Evidence, EvidenceClass, EvidenceType, Incident,
    IncidentStatus, Severity,
};

/// Initialize env_logger for shells that have no logging of their own
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

//! Logic Module - Alert Lifecycle Engines
//!
//! - `synthetic` - Candidate event generation from scenario templates
//! - `risk` - Risk Analysis Service adapter (classify-or-drop)
//! - `store` - Authoritative in-memory alerts/evidence + reconciliation
//! - `escalation` - Alert state machine & incident promotion
//! - `response_time` - Rolling SLA estimate for the dashboard
//! - `scheduler` - Cancellable background cadence
//! - `notify` - Notification sink seam + audio guard
//! - `engine` - Composition root / pipeline

pub mod engine;
pub mod escalation;
pub mod notify;
pub mod persist;
pub mod response_time;
pub mod risk;
pub mod scheduler;
pub mod store;
pub mod synthetic;
pub mod types;

//! Central Configuration Constants
//!
//! Single source of truth for the engine's tunables.
//! To change a default cadence or threshold, only edit this file.

/// Default Risk Analysis Service URL
///
/// This is the fallback URL when no environment variable is set.
/// For development: http://localhost:8080
pub const DEFAULT_RISK_SERVICE_URL: &str = "http://localhost:8080";

/// Deadline for a single Risk Analysis Service call (seconds)
pub const CLASSIFY_DEADLINE_SECS: u64 = 15;

/// How many of the most recent records to load per table at startup
pub const SEED_LIMIT: usize = 100;

/// Rolling window size for observed acknowledge-latencies
pub const RESPONSE_SAMPLE_WINDOW: usize = 20;

/// Per-sample and display cap for response times (14m59s, keeps the
/// SLA-style average under the 15-minute threshold)
pub const MAX_RESPONSE_SECS: f64 = 899.0;

/// Floor for the displayed response-time estimate (seconds)
pub const MIN_DISPLAY_SECS: f64 = 15.0;

/// Weight of historical samples vs. live pending wait in the blend
pub const HISTORY_BLEND_WEIGHT: f64 = 0.7;
pub const PENDING_BLEND_WEIGHT: f64 = 0.3;

/// Baseline shown when there is no history and nothing pending (seconds)
pub const FALLBACK_BASELINE_SECS: f64 = 45.0;

/// Scheduler cadence bounds: next cycle fires uniformly in [min, max)
pub const CYCLE_MIN_SECS: u64 = 15;
pub const CYCLE_MAX_SECS: u64 = 45;

/// Estimator refresh period (seconds)
pub const ESTIMATE_REFRESH_SECS: u64 = 1;

/// Chance of inserting one unrelated benign evidence record per cycle
pub const NOISE_EVIDENCE_PROBABILITY: f64 = 0.2;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get Risk Analysis Service URL from environment or use default
pub fn get_risk_service_url() -> String {
    std::env::var("RISK_SERVICE_URL").unwrap_or_else(|_| DEFAULT_RISK_SERVICE_URL.to_string())
}

/// Get classifier deadline from environment or use default
pub fn get_classify_deadline_secs() -> u64 {
    std::env::var("RISK_CLASSIFY_DEADLINE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(CLASSIFY_DEADLINE_SECS)
}

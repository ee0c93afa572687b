//! Risk Classifier Adapter
//!
//! Submits a candidate event's attributes to the Risk Analysis Service
//! and maps the response to a severity and rationale. A candidate whose
//! response fails, times out, or carries no usable score is dropped -
//! an alert without a trustworthy severity must not enter the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::synthetic::CandidateEvent;
use super::types::Severity;

mod client;

pub use client::{HttpRiskService, RiskServiceConfig};

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RiskRequest {
    pub scenario_type: String,
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskResponse {
    pub risk_score: Option<f64>,
    pub severity: Option<Severity>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub detection_reasons: Vec<String>,
}

/// Usable classification extracted from a service response
#[derive(Debug, Clone)]
pub struct Classification {
    pub risk_score: f64,
    pub severity: Severity,
    pub recommended_actions: Vec<String>,
    pub detection_reasons: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("network error: {0}")]
    Network(String),
    #[error("service returned status {0}")]
    Server(u16),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

// ============================================================================
// SERVICE TRAIT
// ============================================================================

/// Opaque Risk Analysis Service collaborator
#[async_trait]
pub trait RiskAnalysisService: Send + Sync {
    async fn analyze(&self, request: RiskRequest) -> Result<RiskResponse, RiskError>;
}

// ============================================================================
// ADAPTER
// ============================================================================

/// Classify a candidate under an explicit deadline.
///
/// Returns `None` (candidate rejected) on any service failure or when
/// the response lacks a numeric risk score or a severity. On success the
/// full classification result is attached to the candidate's attribute
/// bag under "analysis" so downstream consumers retain the rationale.
pub async fn classify(
    service: &dyn RiskAnalysisService,
    candidate: &mut CandidateEvent,
    deadline: Duration,
) -> Option<Classification> {
    let request = RiskRequest {
        scenario_type: candidate.scenario.as_str().to_string(),
        attributes: candidate.attributes.clone(),
    };

    let response = match tokio::time::timeout(deadline, service.analyze(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            log::warn!("Risk analysis failed for {}: {}", candidate.scenario, e);
            return None;
        }
        Err(_) => {
            log::warn!(
                "Risk analysis deadline ({:?}) exceeded for {}",
                deadline,
                candidate.scenario
            );
            return None;
        }
    };

    let risk_score = match response.risk_score {
        Some(score) => score,
        None => {
            log::warn!(
                "Risk analysis returned no score for {}, candidate dropped",
                candidate.scenario
            );
            return None;
        }
    };

    // A score without a severity is equally untrustworthy
    let severity = match response.severity {
        Some(severity) => severity,
        None => {
            log::warn!(
                "Risk analysis returned no severity for {}, candidate dropped",
                candidate.scenario
            );
            return None;
        }
    };

    let classification = Classification {
        risk_score,
        severity,
        recommended_actions: response.recommended_actions,
        detection_reasons: response.detection_reasons,
    };

    candidate.attributes.insert(
        "analysis".to_string(),
        json!({
            "risk_score": classification.risk_score,
            "severity": classification.severity,
            "recommended_actions": classification.recommended_actions,
            "detection_reasons": classification.detection_reasons,
        }),
    );

    Some(classification)
}

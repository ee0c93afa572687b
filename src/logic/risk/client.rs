//! Risk Analysis Service HTTP Client

use std::time::Duration;

use async_trait::async_trait;

use super::{RiskAnalysisService, RiskError, RiskRequest, RiskResponse};
use crate::constants;

/// Risk service configuration
#[derive(Debug, Clone)]
pub struct RiskServiceConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for RiskServiceConfig {
    fn default() -> Self {
        Self {
            base_url: constants::get_risk_service_url(),
            timeout_seconds: constants::get_classify_deadline_secs(),
        }
    }
}

/// HTTP-backed Risk Analysis Service
pub struct HttpRiskService {
    config: RiskServiceConfig,
    http_client: reqwest::Client,
}

impl HttpRiskService {
    pub fn new(config: RiskServiceConfig) -> Result<Self, RiskError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| RiskError::Network(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl RiskAnalysisService for HttpRiskService {
    async fn analyze(&self, request: RiskRequest) -> Result<RiskResponse, RiskError> {
        let url = format!("{}/api/v1/risk/analyze", self.config.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RiskError::DeadlineExceeded
                } else {
                    RiskError::Network(e.to_string())
                }
            })?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| RiskError::Parse(e.to_string()))
        } else {
            Err(RiskError::Server(response.status().as_u16()))
        }
    }
}

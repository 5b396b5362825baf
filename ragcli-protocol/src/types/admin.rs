//! Admin endpoint payloads (init, health)

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::sources::SourceRecord;

/// Request body for `/v1/admin/init`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InitRequest {
    #[serde(default)]
    pub trace_id: String,
}

/// Initialization summary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitResponse {
    pub catalog_version: u64,
    #[serde(default)]
    pub created_directories: Vec<String>,
    #[serde(default)]
    pub seeded_sources: Vec<SourceRecord>,
    #[serde(default)]
    pub dependency_checks: Vec<DependencyCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Dependency readiness result from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

/// Request body for `/v1/admin/health`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthRequest {
    #[serde(default)]
    pub trace_id: String,
}

/// Component readiness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Failed,
}

/// Individual component check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub component: String,
    pub status: HealthStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HashMap<String, f64>>,
}

/// Aggregated health component results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub overall_status: HealthStatus,
    pub trace_id: String,
    #[serde(default)]
    pub results: Vec<HealthResult>,
}

impl HealthSummary {
    /// Fold component results into an overall status: any failure wins,
    /// then any degradation, otherwise healthy.
    pub fn aggregate(trace_id: String, results: Vec<HealthResult>) -> Self {
        let overall_status = results
            .iter()
            .map(|r| r.status)
            .fold(HealthStatus::Healthy, |acc, status| match (acc, status) {
                (HealthStatus::Failed, _) | (_, HealthStatus::Failed) => HealthStatus::Failed,
                (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
                _ => HealthStatus::Healthy,
            });

        Self {
            overall_status,
            trace_id,
            results,
        }
    }
}

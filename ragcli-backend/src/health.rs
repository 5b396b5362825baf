//! Health probes for the local services the backend depends on
//!
//! Probes run through a [`GuardedHttpClient`] handed in by the caller, so
//! the offline guard confines them to loopback endpoints.

use async_trait::async_trait;

use ragcli_protocol::types::{HealthResult, HealthStatus, HealthSummary};
use ragcli_utils::{GuardedHttpClient, RagCliError};

use crate::ports::{HealthPort, PortError};

/// Default readiness endpoint of the local vector store.
pub const DEFAULT_VECTOR_STORE_URL: &str = "http://127.0.0.1:8080/v1/.well-known/ready";

/// Default readiness endpoint of the local LLM runtime.
pub const DEFAULT_LLM_URL: &str = "http://127.0.0.1:11434/api/tags";

/// Health port probing local service endpoints over HTTP.
pub struct HttpHealthPort {
    http: GuardedHttpClient,
    vector_store_url: String,
    llm_url: String,
}

impl HttpHealthPort {
    /// Probe the default loopback endpoints.
    pub fn new(http: GuardedHttpClient) -> Self {
        Self::with_endpoints(http, DEFAULT_VECTOR_STORE_URL, DEFAULT_LLM_URL)
    }

    /// Probe custom endpoints (still subject to the offline guard).
    pub fn with_endpoints(
        http: GuardedHttpClient,
        vector_store_url: impl Into<String>,
        llm_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            vector_store_url: vector_store_url.into(),
            llm_url: llm_url.into(),
        }
    }

    async fn probe(&self, component: &str, url: &str) -> HealthResult {
        match self.http.get(url).await {
            Ok(response) if response.is_success() => HealthResult {
                component: component.into(),
                status: HealthStatus::Healthy,
                message: format!("{} responded with status {}", component, response.status),
                remediation: None,
                metrics: None,
            },
            Ok(response) => HealthResult {
                component: component.into(),
                status: HealthStatus::Degraded,
                message: format!("{} responded with status {}", component, response.status),
                remediation: Some(format!("Inspect the {} service logs.", component)),
                metrics: None,
            },
            Err(RagCliError::ExternalNetworkBlocked { host }) => HealthResult {
                component: component.into(),
                status: HealthStatus::Failed,
                message: format!("probe target {:?} is not a loopback address", host),
                remediation: Some(format!(
                    "Point the {} endpoint at a local service.",
                    component
                )),
                metrics: None,
            },
            Err(e) => HealthResult {
                component: component.into(),
                status: HealthStatus::Failed,
                message: format!("{} probe failed: {}", component, e),
                remediation: Some(format!(
                    "Ensure the {} service is running locally.",
                    component
                )),
                metrics: None,
            },
        }
    }
}

#[async_trait]
impl HealthPort for HttpHealthPort {
    async fn evaluate(&self, trace_id: String) -> Result<HealthSummary, PortError> {
        let results = vec![
            self.probe("vector-store", &self.vector_store_url).await,
            self.probe("llm", &self.llm_url).await,
        ];
        Ok(HealthSummary::aggregate(trace_id, results))
    }
}

//! Domain ports consumed by the transport router
//!
//! The business rules behind these traits live outside the transport
//! subsystem; the router only needs the boundary contracts plus an error
//! shape it can serialize onto the wire.

use async_trait::async_trait;

use ragcli_protocol::types::{
    HealthSummary, InitResponse, QueryRequest, QueryResponse, ReindexRequest,
    SourceCreateRequest, SourceListResponse, SourceMutationResponse, SourceRemoveRequest,
    SourceUpdateRequest,
};
use ragcli_protocol::JobSnapshot;

use crate::stream::JobStream;

/// Failure surfaced by a port, carrying the HTTP-like status the router
/// writes into the response frame.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("{message}")]
    Invalid { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Unavailable {
        code: String,
        message: String,
        remediation: Option<String>,
    },

    #[error("{message}")]
    Internal { message: String },
}

impl PortError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn unavailable(
        code: impl Into<String>,
        message: impl Into<String>,
        remediation: Option<String>,
    ) -> Self {
        Self::Unavailable {
            code: code.into(),
            message: message.into(),
            remediation,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Answers questions against the indexed knowledge base.
#[async_trait]
pub trait QueryPort: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, PortError>;
}

/// Manages the source catalog and index rebuild jobs.
#[async_trait]
pub trait IngestionPort: Send + Sync {
    async fn list_sources(&self) -> Result<SourceListResponse, PortError>;

    async fn create_source(
        &self,
        request: SourceCreateRequest,
    ) -> Result<SourceMutationResponse, PortError>;

    async fn update_source(
        &self,
        alias: &str,
        request: SourceUpdateRequest,
    ) -> Result<SourceMutationResponse, PortError>;

    async fn remove_source(
        &self,
        alias: &str,
        request: SourceRemoveRequest,
    ) -> Result<SourceMutationResponse, PortError>;

    /// Start a reindex job: returns the initial snapshot immediately and a
    /// stream of follow-up snapshots published by a background worker.
    async fn start_reindex(
        &self,
        request: ReindexRequest,
    ) -> Result<(JobSnapshot, JobStream), PortError>;

    /// Bootstrap summary for admin workflows.
    async fn init_system(&self) -> Result<InitResponse, PortError>;
}

/// Aggregates component readiness diagnostics.
#[async_trait]
pub trait HealthPort: Send + Sync {
    async fn evaluate(&self, trace_id: String) -> Result<HealthSummary, PortError>;
}

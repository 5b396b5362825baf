//! Typed endpoint operations
//!
//! Each method normalizes its input, sends one framed request, and decodes
//! the response body against the endpoint's expected status.

use serde::de::DeserializeOwned;
use serde_json::Value;

use ragcli_protocol::types::{
    HealthRequest, HealthSummary, InitRequest, InitResponse, QueryRequest, QueryResponse,
    ReindexRequest, SourceCreateRequest, SourceListRequest, SourceListResponse,
    SourceMutationResponse, SourceRemoveRequest, SourceUpdateRequest,
};
use ragcli_protocol::{
    new_trace_id, JobEnvelope, JobSnapshot, ADMIN_HEALTH_PATH, ADMIN_INIT_PATH,
    INDEX_REINDEX_PATH, QUERY_PATH, SOURCES_PATH, STATUS_ACCEPTED, STATUS_CREATED, STATUS_OK,
};
use ragcli_utils::{RagCliError, Result};

use crate::client::Client;
use crate::config::DEFAULT_MAX_CONTEXT_TOKENS;

impl Client {
    /// Send a `/v1/query` request and decode the structured response.
    pub async fn query(&self, mut request: QueryRequest) -> Result<QueryResponse> {
        request.question = request.question.trim().to_string();
        if request.question.is_empty() {
            return Err(RagCliError::invalid_request("question must not be empty"));
        }
        request.conversation_id = trim_optional(request.conversation_id);
        request.trace_id = trim_optional(request.trace_id);
        if request.max_context_tokens == 0 {
            request.max_context_tokens = DEFAULT_MAX_CONTEXT_TOKENS;
        }

        let body = self.call(QUERY_PATH, to_body(&request)?, STATUS_OK).await?;
        let response: QueryResponse = decode_body(body, "query response")?;

        if response.summary.trim().is_empty() {
            return Err(RagCliError::invalid_response("summary is required"));
        }
        Ok(response)
    }

    /// Fetch the catalog snapshot.
    pub async fn list_sources(&self, mut request: SourceListRequest) -> Result<SourceListResponse> {
        request.trace_id = ensure_trace_id(request.trace_id);

        let body = self
            .call(SOURCES_PATH, to_body(&request)?, STATUS_OK)
            .await?;
        decode_body(body, "source list response")
    }

    /// Register a new knowledge source.
    pub async fn create_source(
        &self,
        mut request: SourceCreateRequest,
    ) -> Result<SourceMutationResponse> {
        request.trace_id = ensure_trace_id(request.trace_id);
        request.source_type = request.source_type.trim().to_string();
        if request.source_type.is_empty() {
            return Err(RagCliError::invalid_request("source type is required"));
        }
        request.location = request.location.trim().to_string();
        if request.location.is_empty() {
            return Err(RagCliError::invalid_request("source location is required"));
        }
        request.language = trim_optional(request.language);

        let body = self
            .call(SOURCES_PATH, to_body(&request)?, STATUS_CREATED)
            .await?;
        decode_body(body, "source mutation response")
    }

    /// Mutate metadata for an existing source.
    pub async fn update_source(
        &self,
        alias: &str,
        mut request: SourceUpdateRequest,
    ) -> Result<SourceMutationResponse> {
        let alias = validate_alias(alias)?;
        request.trace_id = ensure_trace_id(request.trace_id);

        let body = self
            .call(&source_alias_path(&alias), to_body(&request)?, STATUS_OK)
            .await?;
        decode_body(body, "source mutation response")
    }

    /// Quarantine a source and remove it from the active catalog.
    pub async fn remove_source(
        &self,
        alias: &str,
        mut request: SourceRemoveRequest,
    ) -> Result<SourceMutationResponse> {
        let alias = validate_alias(alias)?;
        request.trace_id = ensure_trace_id(request.trace_id);
        request.reason = request.reason.trim().to_string();
        if request.reason.is_empty() {
            return Err(RagCliError::invalid_request("removal reason is required"));
        }

        let body = self
            .call(
                &source_alias_path(&alias),
                to_body(&request)?,
                STATUS_ACCEPTED,
            )
            .await?;
        decode_body(body, "source mutation response")
    }

    /// Trigger an index rebuild and return the first job snapshot.
    pub async fn start_reindex(&self, mut request: ReindexRequest) -> Result<JobSnapshot> {
        request.trace_id = ensure_trace_id(request.trace_id);

        let body = self
            .call(INDEX_REINDEX_PATH, to_body(&request)?, STATUS_ACCEPTED)
            .await?;
        let envelope: JobEnvelope = decode_body(body, "ingestion job")?;
        Ok(envelope.job)
    }

    /// Execute `/v1/admin/init` and return the backend summary.
    pub async fn init_system(&self, mut request: InitRequest) -> Result<InitResponse> {
        request.trace_id = ensure_trace_id(request.trace_id);

        let body = self
            .call(ADMIN_INIT_PATH, to_body(&request)?, STATUS_OK)
            .await?;
        let mut response: InitResponse = decode_body(body, "init response")?;
        if response.trace_id.is_none() {
            response.trace_id = Some(request.trace_id);
        }
        Ok(response)
    }

    /// Aggregate component health via `/v1/admin/health`.
    pub async fn health_check(&self, mut request: HealthRequest) -> Result<HealthSummary> {
        request.trace_id = ensure_trace_id(request.trace_id);

        let body = self
            .call(ADMIN_HEALTH_PATH, to_body(&request)?, STATUS_OK)
            .await?;
        let mut summary: HealthSummary = decode_body(body, "health summary")?;
        if summary.trace_id.is_empty() {
            summary.trace_id = request.trace_id;
        }
        Ok(summary)
    }
}

/// Decode a JSON envelope like `{"job": {...}}` into a snapshot.
pub(crate) fn decode_job(body: Value) -> Result<JobSnapshot> {
    let envelope: JobEnvelope = decode_body(body, "ingestion job")?;
    Ok(envelope.job)
}

pub(crate) fn to_body<T: serde::Serialize>(request: &T) -> Result<Value> {
    serde_json::to_value(request)
        .map_err(|e| RagCliError::internal(format!("failed to encode request body: {}", e)))
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: Value, what: &str) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| RagCliError::invalid_response(format!("{}: {}", what, e)))
}

pub(crate) fn ensure_trace_id(trace_id: String) -> String {
    let trimmed = trace_id.trim();
    if trimmed.is_empty() {
        new_trace_id()
    } else {
        trimmed.to_string()
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Aliases ride in the request path, so they are restricted to a safe
/// charset instead of being escaped; the backend enforces the same rule.
fn validate_alias(alias: &str) -> Result<String> {
    let alias = alias.trim();
    if alias.is_empty() {
        return Err(RagCliError::invalid_request("alias must be provided"));
    }
    if !alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(RagCliError::invalid_request(format!(
            "alias {:?} contains unsupported characters",
            alias
        )));
    }
    Ok(alias.to_string())
}

fn source_alias_path(alias: &str) -> String {
    format!("{}/{}", SOURCES_PATH, alias)
}

//! Request routing for the transport layer
//!
//! Maps request paths onto the domain ports and serializes results (or
//! typed transport errors) into response-frame statuses and bodies.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use ragcli_protocol::types::{
    QueryRequest, ReindexRequest, SourceCreateRequest, SourceRemoveRequest, SourceUpdateRequest,
};
use ragcli_protocol::{
    new_trace_id, JobEnvelope, ADMIN_HEALTH_PATH, ADMIN_INIT_PATH, INDEX_REINDEX_PATH, QUERY_PATH,
    SOURCES_PATH, STATUS_ACCEPTED, STATUS_CREATED, STATUS_OK,
};

use crate::ports::{HealthPort, IngestionPort, PortError, QueryPort};
use crate::stream::JobStream;

/// Failure serialized onto the wire as an error-status response frame.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct TransportError {
    pub status: u16,
    pub code: String,
    pub message: String,
    pub remediation: Option<String>,
}

impl TransportError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            remediation: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(400, "INVALID_REQUEST", message)
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(404, "NOT_FOUND", format!("Unknown path {:?}", path))
    }

    /// Response frame body for this error.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(remediation) = &self.remediation {
            body["remediation"] = json!(remediation);
        }
        body
    }
}

impl From<PortError> for TransportError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Invalid { message } => Self::invalid(message),
            PortError::NotFound { message } => Self::new(404, "NOT_FOUND", message),
            PortError::Unavailable {
                code,
                message,
                remediation,
            } => Self {
                status: 503,
                code,
                message,
                remediation,
            },
            PortError::Internal { message } => Self::new(500, "INTERNAL", message),
        }
    }
}

/// Outcome of dispatching one request.
pub enum Dispatch {
    /// Exactly one response frame.
    Single { status: u16, body: Value },
    /// An initial response frame followed by streamed job snapshots.
    Stream {
        status: u16,
        first: Value,
        stream: JobStream,
    },
}

/// Route transport frames to domain ports and serialize responses.
pub struct Router {
    query: Arc<dyn QueryPort>,
    ingestion: Arc<dyn IngestionPort>,
    health: Option<Arc<dyn HealthPort>>,
}

impl Router {
    pub fn new(query: Arc<dyn QueryPort>, ingestion: Arc<dyn IngestionPort>) -> Self {
        Self {
            query,
            ingestion,
            health: None,
        }
    }

    pub fn with_health(mut self, health: Arc<dyn HealthPort>) -> Self {
        self.health = Some(health);
        self
    }

    /// Dispatch a transport path to the appropriate handler.
    pub async fn dispatch(&self, path: &str, body: Value) -> Result<Dispatch, TransportError> {
        if path == QUERY_PATH {
            return self.handle_query(body).await;
        }
        if path == SOURCES_PATH {
            return self.handle_sources(body).await;
        }
        if let Some(alias) = path
            .strip_prefix(SOURCES_PATH)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            return self.handle_source_alias(alias, body).await;
        }
        if path == INDEX_REINDEX_PATH {
            return self.handle_reindex(body).await;
        }
        if path == ADMIN_INIT_PATH {
            return self.handle_admin_init(body).await;
        }
        if path == ADMIN_HEALTH_PATH {
            return self.handle_admin_health(body).await;
        }
        Err(TransportError::not_found(path))
    }

    async fn handle_query(&self, body: Value) -> Result<Dispatch, TransportError> {
        if body.get("question").is_none() {
            return Err(TransportError::invalid(
                "Missing 'question' field in query request body",
            ));
        }

        let mut request: QueryRequest = decode(body, "query request")?;
        if request.max_context_tokens == 0 {
            request.max_context_tokens = 4096;
        }

        let response = self.query.query(request).await?;
        single(STATUS_OK, &response)
    }

    /// `/v1/sources` carries both listings and registrations; a body with
    /// source fields is a registration.
    async fn handle_sources(&self, body: Value) -> Result<Dispatch, TransportError> {
        let is_create = body.get("type").is_some() || body.get("location").is_some();
        if is_create {
            let request: SourceCreateRequest = decode(body, "source create request")?;
            if request.source_type.trim().is_empty() {
                return Err(TransportError::invalid("source type is required"));
            }
            if request.location.trim().is_empty() {
                return Err(TransportError::invalid("source location is required"));
            }
            let response = self.ingestion.create_source(request).await?;
            return single(STATUS_CREATED, &response);
        }

        let trace_id = extract_trace_id(&body);
        let mut response = self.ingestion.list_sources().await?;
        response.trace_id = Some(trace_id);
        single(STATUS_OK, &response)
    }

    /// `/v1/sources/<alias>` carries updates and removals; a removal always
    /// names its reason.
    async fn handle_source_alias(
        &self,
        alias: &str,
        body: Value,
    ) -> Result<Dispatch, TransportError> {
        if body.get("reason").is_some() {
            let request: SourceRemoveRequest = decode(body, "source remove request")?;
            if request.reason.trim().is_empty() {
                return Err(TransportError::invalid("removal reason is required"));
            }
            let response = self.ingestion.remove_source(alias, request).await?;
            return single(STATUS_ACCEPTED, &response);
        }

        let request: SourceUpdateRequest = decode(body, "source update request")?;
        let response = self.ingestion.update_source(alias, request).await?;
        single(STATUS_OK, &response)
    }

    async fn handle_reindex(&self, body: Value) -> Result<Dispatch, TransportError> {
        let request: ReindexRequest = decode(body, "reindex request")?;

        let (initial, stream) = self.ingestion.start_reindex(request).await?;
        let first = serde_json::to_value(JobEnvelope { job: initial })
            .map_err(|e| TransportError::new(500, "INTERNAL", e.to_string()))?;

        Ok(Dispatch::Stream {
            status: STATUS_ACCEPTED,
            first,
            stream,
        })
    }

    async fn handle_admin_init(&self, body: Value) -> Result<Dispatch, TransportError> {
        let trace_id = extract_trace_id(&body);
        let mut response = self.ingestion.init_system().await?;
        response.trace_id = Some(trace_id);
        single(STATUS_OK, &response)
    }

    async fn handle_admin_health(&self, body: Value) -> Result<Dispatch, TransportError> {
        let Some(health) = &self.health else {
            return Err(TransportError::new(
                503,
                "HEALTH_UNAVAILABLE",
                "Health diagnostics are unavailable on this backend.",
            ));
        };

        let trace_id = extract_trace_id(&body);
        let summary = health.evaluate(trace_id).await?;
        single(STATUS_OK, &summary)
    }
}

fn single<T: serde::Serialize>(status: u16, payload: &T) -> Result<Dispatch, TransportError> {
    let body = serde_json::to_value(payload)
        .map_err(|e| TransportError::new(500, "INTERNAL", e.to_string()))?;
    Ok(Dispatch::Single { status, body })
}

fn decode<T: DeserializeOwned>(body: Value, what: &str) -> Result<T, TransportError> {
    serde_json::from_value(body)
        .map_err(|e| TransportError::invalid(format!("Malformed {}: {}", what, e)))
}

/// Sanitized trace ID from the request body, generated when absent.
fn extract_trace_id(body: &Value) -> String {
    body.get("trace_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_trace_id)
}

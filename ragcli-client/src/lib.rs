//! ragcli-client: IPC client for the backend Unix socket
//!
//! Provides a connection-per-caller client speaking the length-prefixed
//! JSON frame protocol: handshake on connect, one request/response (or one
//! full snapshot stream) at a time per connection, bounded frame-read
//! retries, and typed wrappers for every backend endpoint.

mod calls;
mod client;
mod config;
mod retry;
mod stream;

pub use client::{Client, SessionState};
pub use config::{ClientConfig, DEFAULT_MAX_CONTEXT_TOKENS};
pub use retry::{FrameSource, RetrySchedule};

// Shared payload types, re-exported so callers need only this crate
pub use ragcli_protocol::types::{
    DependencyCheck, HealthRequest, HealthResult, HealthStatus, HealthSummary, InitRequest,
    InitResponse, QuarantineInfo, QueryCitation, QueryReference, QueryRequest, QueryResponse,
    ReindexRequest, SourceCreateRequest, SourceListRequest, SourceListResponse,
    SourceMutationResponse, SourceRecord, SourceRemoveRequest, SourceStatus, SourceUpdateRequest,
};
pub use ragcli_protocol::{new_trace_id, JobOutcome, JobSnapshot, JobStatus};

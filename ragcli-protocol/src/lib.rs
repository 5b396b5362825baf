//! ragcli-protocol: Shared IPC definitions for client-backend communication
//!
//! This crate defines the wire frames, frame codec, correlation tokens, and
//! payload types used for communication between the ragcli clients and the
//! backend daemon over Unix sockets.

pub mod codec;
pub mod correlation;
pub mod frames;
pub mod job;
pub mod types;

// Re-export main types at crate root
pub use codec::{CodecError, FrameCodec};
pub use correlation::{new_trace_id, CorrelationId};
pub use frames::Frame;
pub use job::{IngestionTrigger, JobEnvelope, JobOutcome, JobSnapshot, JobStatus};

/// Protocol identifier exchanged during the handshake
pub const PROTOCOL_NAME: &str = "rag-cli-ipc";

/// Current protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum serialized frame payload size (16 MiB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default client identifier sent in the handshake
pub const DEFAULT_CLIENT_ID: &str = "ipc-client";

/// Server identifier returned in the handshake acknowledgement
pub const SERVER_ID: &str = "rag-backend";

// Request paths understood by the backend router
pub const QUERY_PATH: &str = "/v1/query";
pub const SOURCES_PATH: &str = "/v1/sources";
pub const INDEX_REINDEX_PATH: &str = "/v1/index/reindex";
pub const ADMIN_INIT_PATH: &str = "/v1/admin/init";
pub const ADMIN_HEALTH_PATH: &str = "/v1/admin/health";

// HTTP-like response statuses used on the wire
pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_ACCEPTED: u16 = 202;

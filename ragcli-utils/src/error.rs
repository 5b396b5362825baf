//! Error types for ragcli
//!
//! Provides a unified error type used across all ragcli crates.

use std::path::PathBuf;

/// Main error type for ragcli operations
#[derive(Debug, thiserror::Error)]
pub enum RagCliError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Backend not running at {path}")]
    BackendNotRunning { path: PathBuf },

    #[error("Dial timeout after {millis}ms")]
    DialTimeout { millis: u64 },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Client is closed")]
    ClientClosed,

    // === Transient Transport Errors (the only retryable kinds) ===

    #[error("Frame read timed out")]
    ReadTimeout,

    #[error("Unexpected end of stream mid-frame")]
    UnexpectedEof,

    #[error("Call deadline exceeded")]
    DeadlineExceeded,

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Handshake protocol mismatch: expected {expected:?}, got {actual:?}")]
    ProtocolMismatch { expected: String, actual: String },

    #[error("Handshake version mismatch: client={client}, server={server}")]
    VersionMismatch { client: u32, server: u32 },

    #[error("Correlation id mismatch: expected {expected}, got {actual}")]
    CorrelationMismatch { expected: String, actual: String },

    #[error("Stream ended before a terminal job snapshot")]
    StreamIncomplete,

    #[error("Backend returned status {status} for {path}")]
    UnexpectedStatus { path: String, status: u16 },

    // === Offline Guard ===

    #[error("External network access blocked for host {host:?}")]
    ExternalNetworkBlocked { host: String },

    // === Request/Response Validation ===

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response payload: {0}")]
    InvalidResponse(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagCliError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an invalid-request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an invalid-response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check whether another frame-read attempt is warranted.
    ///
    /// Only read timeouts and unexpected end-of-stream qualify; every
    /// protocol, handshake, or correlation failure is fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadTimeout | Self::UnexpectedEof)
    }
}

/// Result type alias using RagCliError
pub type Result<T> = std::result::Result<T, RagCliError>;

//! Client configuration

use std::path::PathBuf;
use std::time::Duration;

use ragcli_protocol::DEFAULT_CLIENT_ID;
use ragcli_utils::paths;

use crate::retry::RetrySchedule;

/// Default `max_context_tokens` applied when a query does not set one.
pub const DEFAULT_MAX_CONTEXT_TOKENS: u32 = 4096;

/// Default socket dial timeout.
const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(2);

/// Default deadline for a single request/response round trip.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for a full snapshot stream (reindex jobs take a while).
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(600);

/// Default per-attempt frame read timeout.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// How to construct a new IPC client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Filesystem path of the backend Unix socket.
    pub socket_path: PathBuf,
    /// Human-readable identifier sent in the handshake.
    pub client_id: String,
    /// Bound on establishing the socket connection.
    pub dial_timeout: Duration,
    /// Deadline for a single-frame call, including all read retries.
    pub call_timeout: Duration,
    /// Deadline for a full snapshot stream, including all read retries.
    pub stream_timeout: Duration,
    /// Per-attempt frame read timeout.
    pub read_timeout: Duration,
    /// Backoff delays between frame read retries.
    pub retry_schedule: RetrySchedule,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: paths::default_socket_path(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            retry_schedule: RetrySchedule::default(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at an explicit socket path.
    pub fn with_socket_path(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
            ..Self::default()
        }
    }

    /// Override the client identifier sent in the handshake.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.client_id, "ipc-client");
        assert_eq!(config.dial_timeout, Duration::from_secs(2));
        assert_eq!(config.retry_schedule.delays().len(), 3);
    }

    #[test]
    fn test_with_socket_path() {
        let config = ClientConfig::with_socket_path("/tmp/test.sock").client_id("ragman");
        assert_eq!(config.socket_path, PathBuf::from("/tmp/test.sock"));
        assert_eq!(config.client_id, "ragman");
    }
}

//! Backend daemon configuration

use std::path::PathBuf;

use clap::Parser;

use ragcli_utils::paths;

/// Command line arguments for the backend daemon.
#[derive(Debug, Parser)]
#[command(name = "rag-backend", about = "ragcli backend daemon")]
pub struct BackendArgs {
    /// Unix socket path to listen on
    #[arg(long, env = "RAGCLI_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Log filter (e.g. "info", "ragcli_backend=debug")
    #[arg(long, env = "RAGCLI_LOG", default_value = "info")]
    pub log_filter: String,

    /// Snapshot queue capacity per streaming job
    #[arg(long, default_value_t = 16)]
    pub stream_queue_capacity: usize,

    /// Log to stderr instead of the state-dir log file
    #[arg(long)]
    pub foreground: bool,
}

impl BackendArgs {
    pub fn into_config(self) -> BackendConfig {
        BackendConfig {
            socket_path: self.socket.unwrap_or_else(paths::socket_path),
            log_filter: self.log_filter,
            stream_queue_capacity: self.stream_queue_capacity.max(1),
            foreground: self.foreground,
        }
    }
}

/// Resolved backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub socket_path: PathBuf,
    pub log_filter: String,
    pub stream_queue_capacity: usize,
    pub foreground: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            socket_path: paths::socket_path(),
            log_filter: "info".into(),
            stream_queue_capacity: 16,
            foreground: false,
        }
    }
}

impl BackendConfig {
    /// Config listening on an explicit socket path.
    pub fn with_socket_path(path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: path.into(),
            ..Self::default()
        }
    }
}

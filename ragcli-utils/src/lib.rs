//! ragcli-utils: Common infrastructure shared by the ragcli crates
//!
//! Provides the unified error type, XDG path conventions, tracing setup,
//! and the process-wide offline network guard.

pub mod error;
pub mod logging;
pub mod offline;
pub mod paths;

pub use error::{RagCliError, Result};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};
pub use offline::{
    GuardHandle, GuardedHttpClient, HttpResponse, HttpTransport, OfflineGuard,
};
pub use paths::{default_socket_path, runtime_dir, socket_path};

//! ragcli-backend: Long-lived daemon serving the ragcli IPC socket
//!
//! Accepts Unix socket connections, gates each on a protocol handshake,
//! routes framed requests to the domain ports, and streams job snapshots
//! for long-running operations from a background worker.

pub mod catalog;
pub mod config;
pub mod connection;
pub mod health;
pub mod ports;
pub mod router;
pub mod server;
pub mod stream;

pub use config::{BackendArgs, BackendConfig};
pub use server::Backend;

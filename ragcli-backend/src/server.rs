//! Unix socket listener and accept loop
//!
//! One task per connection: a slow job on one connection never blocks
//! acceptance of new ones.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use ragcli_utils::{RagCliError, Result};

use crate::config::BackendConfig;
use crate::connection;
use crate::router::Router;

/// Socket file mode: owner-only. The filesystem permissions are the only
/// access control on this transport.
const SOCKET_MODE: u32 = 0o600;

/// Bound backend listener.
pub struct Backend {
    listener: UnixListener,
    router: Arc<Router>,
    socket_path: PathBuf,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}

impl Backend {
    /// Bind the backend socket: create the runtime directory, clear a
    /// stale socket file, bind, and restrict permissions.
    pub fn bind(config: &BackendConfig, router: Arc<Router>) -> Result<Self> {
        if let Some(parent) = config.socket_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RagCliError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        cleanup_stale_socket(&config.socket_path)?;

        let listener = UnixListener::bind(&config.socket_path).map_err(|e| {
            RagCliError::connection(format!(
                "Failed to bind {}: {}",
                config.socket_path.display(),
                e
            ))
        })?;

        set_socket_permissions(&config.socket_path)?;

        info!(socket = %config.socket_path.display(), "Backend listening");

        Ok(Self {
            listener,
            router,
            socket_path: config.socket_path.clone(),
        })
    }

    /// Path the listener is bound to.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections forever, spawning one handler task each.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, _addr) = self.listener.accept().await?;
            let router = Arc::clone(&self.router);
            tokio::spawn(async move {
                if let Err(e) = connection::handle_connection(stream, router).await {
                    warn!(error = %e, "Connection ended with error");
                }
            });
        }
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }
    }
}

/// Remove a leftover socket file from a previous run.
///
/// Refuses to touch a path that exists but is not a socket.
fn cleanup_stale_socket(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::FileTypeExt;
                if !metadata.file_type().is_socket() {
                    return Err(RagCliError::config(format!(
                        "{} exists but is not a socket",
                        path.display()
                    )));
                }
            }
            std::fs::remove_file(path)?;
            debug!(socket = %path.display(), "Removed stale socket file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RagCliError::Io(e)),
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(SOCKET_MODE);
    std::fs::set_permissions(path, perms).map_err(|e| RagCliError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

//! Path utilities for ragcli
//!
//! Handles XDG Base Directory specification compliance for config,
//! state, and runtime directories, including the backend socket path.

use std::path::PathBuf;

use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "ragcli";

/// Environment variable overriding the backend socket path
pub const SOCKET_ENV_VAR: &str = "RAGCLI_SOCKET";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the Unix socket path for client-backend communication
///
/// Location: `$XDG_RUNTIME_DIR/ragcli/backend.sock` or
/// `/tmp/ragcli-$UID/backend.sock`
pub fn socket_path() -> PathBuf {
    runtime_dir().join("backend.sock")
}

/// Resolve the socket path, honoring the `RAGCLI_SOCKET` override.
pub fn default_socket_path() -> PathBuf {
    match std::env::var(SOCKET_ENV_VAR) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => socket_path(),
    }
}

/// Get the runtime directory
///
/// Location: `$XDG_RUNTIME_DIR/ragcli` or `/tmp/ragcli-$UID`
pub fn runtime_dir() -> PathBuf {
    if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg_runtime).join(APP_NAME)
    } else {
        // Fallback to /tmp with UID for security
        // SAFETY: getuid() is always safe to call
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/{}-{}", APP_NAME, uid))
    }
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/ragcli` or `~/.config/ragcli`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".config").join(APP_NAME))
}

/// Get the state directory (logs, job history)
///
/// Location: `$XDG_STATE_HOME/ragcli` or `~/.local/state/ragcli`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| home_dir().join(".local").join("state").join(APP_NAME))
}

/// Get the data directory (catalog, index snapshots)
///
/// Location: `$XDG_DATA_HOME/ragcli` or `~/.local/share/ragcli`
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".local").join("share").join(APP_NAME))
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/ragcli/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensure all required directories exist
pub fn ensure_all_dirs() -> std::io::Result<()> {
    ensure_dir(&runtime_dir())?;
    ensure_dir(&config_dir())?;
    ensure_dir(&state_dir())?;
    ensure_dir(&data_dir())?;
    ensure_dir(&log_dir())?;
    Ok(())
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

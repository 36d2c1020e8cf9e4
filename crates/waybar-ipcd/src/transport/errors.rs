//! Error types for socket listener operations.

use std::io;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use thiserror::Error;

/// Errors surfaced while binding, running or tearing down the listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to remove existing socket file {path}: {source}")]
    StaleSocket {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn listener thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("listener thread panicked")]
    ThreadPanic,
}

/// Failures while applying permissions or ownership to the socket file.
///
/// None of these stop the daemon; they are logged as warnings.
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("failed to set mode {mode:#o} on {path}: {source}")]
    Chmod {
        path: Utf8PathBuf,
        mode: u32,
        #[source]
        source: io::Error,
    },
    #[error("user '{name}' not found")]
    UnknownUser { name: String },
    #[error("group '{name}' not found")]
    UnknownGroup { name: String },
    #[error("failed to look up '{name}': {source}")]
    Lookup {
        name: String,
        #[source]
        source: Errno,
    },
    #[error("failed to change ownership of {path}: {source}")]
    Chown {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

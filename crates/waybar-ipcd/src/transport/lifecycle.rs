//! Server run state and the shutdown/teardown sequence.

use std::fs;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use super::LISTENER_TARGET;
use super::connection::ConnectionId;
use super::errors::ListenerError;
use super::registry::ConnectionRegistry;

/// Time a client gets to read the shutdown notice before its socket closes.
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);
/// Time teardown waits for each client session to finish.
pub(crate) const SESSION_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const JOIN_POLL: Duration = Duration::from_millis(10);

/// State shared by the accept loop, client sessions and the server handle.
#[derive(Debug)]
pub(crate) struct ServerState {
    running: AtomicBool,
    connections: ConnectionRegistry,
    next_id: AtomicU64,
}

impl ServerState {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            connections: ConnectionRegistry::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clears the running flag; returns `true` for the call that cleared it.
    pub(crate) fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Stops the server and disconnects every client.
    fn shutdown(&self) -> usize {
        if self.stop() {
            info!(target: LISTENER_TARGET, "initiating server shutdown");
        }
        self.connections
            .broadcast_shutdown_and_close_all(DRAIN_TIMEOUT)
    }
}

/// Cloneable trigger that stops a running server from any thread.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    state: Arc<ServerState>,
}

impl ShutdownTrigger {
    /// Stops accepting, notifies every client and closes their connections.
    ///
    /// Returns the number of clients disconnected by this call. Calling it
    /// again, or concurrently, is harmless.
    pub fn shutdown(&self) -> usize {
        self.state.shutdown()
    }
}

/// Handle to a running socket server.
///
/// Dropping the handle without calling [`ServerHandle::teardown`] performs a
/// best-effort shutdown and teardown.
#[derive(Debug)]
pub struct ServerHandle {
    state: Arc<ServerState>,
    accept: Option<JoinHandle<Vec<JoinHandle<()>>>>,
    socket_path: Utf8PathBuf,
}

impl ServerHandle {
    pub(crate) fn new(
        state: Arc<ServerState>,
        accept: JoinHandle<Vec<JoinHandle<()>>>,
        socket_path: Utf8PathBuf,
    ) -> Self {
        Self {
            state,
            accept: Some(accept),
            socket_path,
        }
    }

    /// Path of the socket file served by this handle.
    #[must_use]
    pub fn socket_path(&self) -> &Utf8Path {
        &self.socket_path
    }

    /// Returns `true` until shutdown begins.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Number of clients currently connected.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.state.connections().len()
    }

    /// Returns a trigger that can stop the server from another thread.
    #[must_use]
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            state: Arc::clone(&self.state),
        }
    }

    /// Stops accepting, notifies every client and closes their connections.
    ///
    /// Reentrant: later calls find nothing left to disconnect.
    pub fn shutdown(&self) -> usize {
        self.state.shutdown()
    }

    /// Stops the server and releases every resource it holds.
    ///
    /// Clients are disconnected, the listening socket is closed, client
    /// sessions are given [`SESSION_JOIN_TIMEOUT`] each to finish and the
    /// socket file is removed.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] when the accept thread panicked.
    /// The remaining cleanup still runs.
    pub fn teardown(mut self) -> Result<(), ListenerError> {
        self.teardown_inner()
    }

    fn teardown_inner(&mut self) -> Result<(), ListenerError> {
        let Some(accept) = self.accept.take() else {
            return Ok(());
        };
        info!(target: LISTENER_TARGET, "cleaning up");

        self.state.shutdown();
        let accepted = accept.join();
        // Connections accepted while the loop was winding down.
        self.state
            .connections()
            .broadcast_shutdown_and_close_all(DRAIN_TIMEOUT);

        let result = match accepted {
            Ok(sessions) => {
                join_sessions(sessions, SESSION_JOIN_TIMEOUT);
                Ok(())
            }
            Err(_) => {
                warn!(target: LISTENER_TARGET, "accept thread panicked; client sessions detached");
                Err(ListenerError::ThreadPanic)
            }
        };

        remove_socket_file(&self.socket_path);
        info!(target: LISTENER_TARGET, "cleanup complete");
        result
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if self.accept.is_some()
            && let Err(error) = self.teardown_inner()
        {
            warn!(target: LISTENER_TARGET, %error, "server teardown failed");
        }
    }
}

/// Waits up to `timeout` for each session thread, then detaches stragglers.
pub(crate) fn join_sessions(sessions: Vec<JoinHandle<()>>, timeout: Duration) {
    let pending = sessions
        .iter()
        .filter(|session| !session.is_finished())
        .count();
    if pending > 0 {
        info!(target: LISTENER_TARGET, sessions = pending, "waiting for client sessions");
    }

    for session in sessions {
        let deadline = Instant::now() + timeout;
        while !session.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL);
        }
        if !session.is_finished() {
            warn!(
                target: LISTENER_TARGET,
                thread = session.thread().name().unwrap_or("unnamed"),
                "client session did not terminate cleanly"
            );
            continue;
        }
        if session.join().is_err() {
            warn!(target: LISTENER_TARGET, "client session panicked");
        }
    }
}

/// Removes the socket file, ignoring a file that is already gone.
pub(crate) fn remove_socket_file(path: &Utf8Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(target: LISTENER_TARGET, path = %path, "removed socket file"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        ),
    }
}

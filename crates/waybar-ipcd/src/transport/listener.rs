//! Listener implementation for the daemon's Unix domain socket.

use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use camino::Utf8Path;
use tracing::{debug, info, warn};

use waybar_ipc_config::SocketSettings;

use super::connection::Connection;
use super::lifecycle::{ServerHandle, ServerState, remove_socket_file};
use super::session::ClientSession;
use super::{LISTENER_TARGET, ListenerError, RequestHandler, permissions};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
/// Interval at which idle sessions re-check the running flag.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(1);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Listener bound to the configured socket path.
#[derive(Debug)]
pub struct SocketListener {
    settings: SocketSettings,
    listener: UnixListener,
}

impl SocketListener {
    /// Replaces any file at the socket path, binds and applies permissions.
    ///
    /// # Errors
    ///
    /// Fails when an existing file cannot be removed or the bind fails.
    /// Permission and ownership problems are only logged.
    pub fn bind(settings: &SocketSettings) -> Result<Self, ListenerError> {
        let path = settings.path();
        remove_existing(path)?;
        let listener = UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
            path: path.to_path_buf(),
            source,
        })?;
        permissions::apply(settings);
        info!(target: LISTENER_TARGET, endpoint = %settings, "socket bound");
        Ok(Self {
            settings: settings.clone(),
            listener,
        })
    }

    /// Path of the bound socket file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.settings.path()
    }

    /// Starts accepting clients on a background thread.
    ///
    /// # Errors
    ///
    /// Fails when the listener cannot be made non-blocking or the accept
    /// thread cannot be spawned. The socket file is removed in both cases.
    pub fn start(self, handler: Arc<dyn RequestHandler>) -> Result<ServerHandle, ListenerError> {
        let socket_path = self.settings.path().to_path_buf();
        if let Err(source) = self.listener.set_nonblocking(true) {
            remove_socket_file(&socket_path);
            return Err(ListenerError::NonBlocking { source });
        }

        let state = Arc::new(ServerState::new());
        let accept_state = Arc::clone(&state);
        let accept = thread::Builder::new()
            .name("waybar-ipc-accept".to_owned())
            .spawn(move || run_accept_loop(self, &accept_state, &handler));
        match accept {
            Ok(accept) => Ok(ServerHandle::new(state, accept, socket_path)),
            Err(source) => {
                remove_socket_file(&socket_path);
                Err(ListenerError::Spawn { source })
            }
        }
    }
}

fn run_accept_loop(
    listener: SocketListener,
    state: &Arc<ServerState>,
    handler: &Arc<dyn RequestHandler>,
) -> Vec<JoinHandle<()>> {
    info!(
        target: LISTENER_TARGET,
        endpoint = %listener.settings,
        "socket listener active"
    );
    let mut sessions = Vec::new();
    let mut last_error = None::<io::ErrorKind>;
    while state.is_running() {
        match listener.listener.accept() {
            Ok((stream, _)) => {
                last_error = None;
                match spawn_session(stream, state, handler) {
                    Ok(session) => sessions.push(session),
                    Err(error) => warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "failed to start client session"
                    ),
                }
                reap_finished(&mut sessions);
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_BACKOFF);
            }
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    debug!(target: LISTENER_TARGET, "socket listener stopped");
    sessions
}

fn spawn_session(
    stream: UnixStream,
    state: &Arc<ServerState>,
    handler: &Arc<dyn RequestHandler>,
) -> io::Result<JoinHandle<()>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

    let id = state.next_connection_id();
    let connection = Arc::new(Connection::new(id, stream));
    let session = ClientSession::open(connection, Arc::clone(state), Arc::clone(handler))?;
    thread::Builder::new()
        .name(format!("waybar-ipc-session-{id}"))
        .spawn(move || session.run())
}

fn reap_finished(sessions: &mut Vec<JoinHandle<()>>) {
    let (finished, running): (Vec<_>, Vec<_>) = sessions
        .drain(..)
        .partition(JoinHandle::is_finished);
    *sessions = running;
    for session in finished {
        if session.join().is_err() {
            warn!(target: LISTENER_TARGET, "client session panicked");
        }
    }
}

fn remove_existing(path: &Utf8Path) -> Result<(), ListenerError> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(target: LISTENER_TARGET, path = %path, "removed existing socket file");
            Ok(())
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ListenerError::StaleSocket {
            path: path.to_path_buf(),
            source,
        }),
    }
}

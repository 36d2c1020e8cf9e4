//! Per-client request loop.
//!
//! A session reads from its connection, frames complete JSON documents, hands
//! each to the [`RequestHandler`] and writes the reply before reading the next
//! one, so responses leave in request order. Reads time out periodically so
//! the session notices a server shutdown even when the client is idle.

use std::io::{self, Read};
use std::os::unix::net::UnixStream;
use std::sync::Arc;

use tracing::{debug, warn};

use super::LISTENER_TARGET;
use super::connection::Connection;
use super::framing::{Frame, RequestFramer};
use super::handler::RequestHandler;
use super::lifecycle::ServerState;

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionExit {
    /// The peer closed its end of the socket.
    PeerClosed,
    /// The server is shutting down.
    Shutdown,
    /// The client sent bytes that are not a JSON document.
    ProtocolError,
    /// Reading from the socket failed.
    ReadFailed,
    /// Writing a reply failed.
    WriteFailed,
}

pub(crate) struct ClientSession {
    connection: Arc<Connection>,
    reader: UnixStream,
    state: Arc<ServerState>,
    handler: Arc<dyn RequestHandler>,
    framer: RequestFramer,
}

impl ClientSession {
    /// Registers `connection` with the server and prepares its reader.
    ///
    /// The registration is undone when the session is dropped.
    pub(crate) fn open(
        connection: Arc<Connection>,
        state: Arc<ServerState>,
        handler: Arc<dyn RequestHandler>,
    ) -> io::Result<Self> {
        let reader = connection.reader()?;
        if !state.connections().add(&connection) {
            warn!(target: LISTENER_TARGET, connection = %connection.id(), "connection registered twice");
        }
        Ok(Self {
            connection,
            reader,
            state,
            handler,
            framer: RequestFramer::default(),
        })
    }

    /// Serves requests until the connection ends and logs the outcome.
    pub(crate) fn run(mut self) {
        debug!(target: LISTENER_TARGET, connection = %self.connection.id(), "client connected");
        let exit = self.serve();
        debug!(
            target: LISTENER_TARGET,
            connection = %self.connection.id(),
            ?exit,
            "client session finished"
        );
    }

    fn serve(&mut self) -> SessionExit {
        let mut chunk = vec![0_u8; READ_CHUNK_BYTES];
        loop {
            if !self.state.is_running() {
                self.deliver_shutdown_notice();
                return SessionExit::Shutdown;
            }
            match self.reader.read(&mut chunk) {
                Ok(0) => return self.finish_at_eof(),
                Ok(read) => {
                    self.framer.extend(&chunk[..read]);
                    if let Some(exit) = self.answer_buffered() {
                        return exit;
                    }
                }
                Err(error) if is_timeout(&error) => {
                    // A partial document that saw no new bytes for a whole
                    // read interval will not be completed.
                    if self.framer.has_partial() {
                        return self.reject_partial();
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    if self.connection.is_closed() {
                        return SessionExit::Shutdown;
                    }
                    warn!(
                        target: LISTENER_TARGET,
                        connection = %self.connection.id(),
                        %error,
                        "failed to read from client"
                    );
                    return SessionExit::ReadFailed;
                }
            }
        }
    }

    fn answer_buffered(&mut self) -> Option<SessionExit> {
        loop {
            match self.framer.next_frame() {
                Frame::Complete(document) => {
                    if let Some(exit) = self.respond(&document) {
                        return Some(exit);
                    }
                }
                Frame::Rejected(bytes) => {
                    return Some(self.respond(&bytes).unwrap_or(SessionExit::ProtocolError));
                }
                Frame::Pending => return None,
            }
        }
    }

    fn respond(&self, request: &[u8]) -> Option<SessionExit> {
        let reply = self.handler.handle(request);
        if let Err(error) = self.connection.send(reply.body()) {
            if self.connection.is_closed() {
                return Some(SessionExit::Shutdown);
            }
            warn!(
                target: LISTENER_TARGET,
                connection = %self.connection.id(),
                %error,
                "failed to write reply"
            );
            return Some(SessionExit::WriteFailed);
        }
        reply
            .closes_connection()
            .then_some(SessionExit::ProtocolError)
    }

    fn reject_partial(&mut self) -> SessionExit {
        let bytes = self.framer.take_partial();
        debug!(
            target: LISTENER_TARGET,
            connection = %self.connection.id(),
            bytes = bytes.len(),
            "rejecting incomplete request"
        );
        self.respond(&bytes).unwrap_or(SessionExit::ProtocolError)
    }

    fn finish_at_eof(&mut self) -> SessionExit {
        if self.connection.is_closed() {
            return SessionExit::Shutdown;
        }
        if self.framer.has_partial() {
            return self.reject_partial();
        }
        SessionExit::PeerClosed
    }

    fn deliver_shutdown_notice(&self) {
        if let Err(error) = self.connection.notify_shutdown() {
            debug!(
                target: LISTENER_TARGET,
                connection = %self.connection.id(),
                %error,
                "failed to deliver shutdown notice"
            );
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.state.connections().remove(self.connection.id());
        self.connection.close();
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

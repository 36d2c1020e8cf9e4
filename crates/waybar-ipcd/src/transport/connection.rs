//! Shared handle to one accepted client socket.
//!
//! A [`Connection`] is owned by its client session and observed, without
//! ownership, by the connection registry. Writes from the session and the
//! shutdown broadcast are serialised through a single lock so envelopes never
//! interleave on the wire.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use super::LISTENER_TARGET;

/// Notice written to every client when the daemon stops.
pub(crate) const SHUTDOWN_NOTICE: &[u8] =
    br#"{"success":false,"error":"Server shutting down","shutdown":true}"#;

const DRAIN_CHUNK_BYTES: usize = 1024;

/// Process-unique identifier of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

pub(crate) struct Connection {
    id: ConnectionId,
    stream: UnixStream,
    write_lock: Mutex<()>,
    closed: AtomicBool,
    notified: AtomicBool,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, stream: UnixStream) -> Self {
        Self {
            id,
            stream,
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            notified: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    /// Independent handle for the session's blocking reads.
    pub(crate) fn reader(&self) -> io::Result<UnixStream> {
        self.stream.try_clone()
    }

    /// Writes one complete envelope.
    pub(crate) fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        let mut stream = &self.stream;
        stream.write_all(bytes)?;
        stream.flush()
    }

    /// Sends [`SHUTDOWN_NOTICE`] unless it was already sent.
    ///
    /// Returns `Ok(false)` when the notice was skipped.
    pub(crate) fn notify_shutdown(&self) -> io::Result<bool> {
        if self.is_closed() || self.notified.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        self.send(SHUTDOWN_NOTICE).map(|()| true)
    }

    /// Reads and discards whatever the peer sends within `timeout`.
    ///
    /// Gives the peer a chance to consume the shutdown notice before the
    /// socket is closed.
    pub(crate) fn drain(&self, timeout: Duration) {
        if self.is_closed() {
            return;
        }
        if let Err(error) = self.stream.set_read_timeout(Some(timeout)) {
            debug!(target: LISTENER_TARGET, connection = %self.id, %error, "drain timeout not applied");
            return;
        }
        let mut buffer = [0_u8; DRAIN_CHUNK_BYTES];
        let mut stream = &self.stream;
        if let Err(error) = stream.read(&mut buffer) {
            debug!(target: LISTENER_TARGET, connection = %self.id, %error, "drain ended");
        }
    }

    /// Shuts the socket down in both directions.
    ///
    /// Only the first call has an effect; it returns `true`.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Err(error) = self.stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(target: LISTENER_TARGET, connection = %self.id, %error, "socket shutdown failed");
        }
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn pair() -> (Connection, UnixStream) {
        let (server, client) = UnixStream::pair().expect("socket pair");
        (Connection::new(ConnectionId::new(1), server), client)
    }

    fn read_available(client: &mut UnixStream) -> Vec<u8> {
        client
            .set_read_timeout(Some(Duration::from_millis(200)))
            .expect("client timeout");
        let mut received = Vec::new();
        let mut buffer = [0_u8; 256];
        loop {
            match client.read(&mut buffer) {
                Ok(0) | Err(_) => return received,
                Ok(read) => received.extend_from_slice(&buffer[..read]),
            }
        }
    }

    #[test]
    fn shutdown_notice_shape() {
        let notice: Value = serde_json::from_slice(SHUTDOWN_NOTICE).expect("decode notice");
        assert_eq!(
            notice,
            json!({"success": false, "error": "Server shutting down", "shutdown": true})
        );
    }

    #[test]
    fn close_is_idempotent() {
        let (connection, mut client) = pair();
        assert!(connection.close());
        assert!(!connection.close());
        assert!(connection.is_closed());
        let mut buffer = [0_u8; 8];
        assert_eq!(client.read(&mut buffer).expect("read eof"), 0);
    }

    #[test]
    fn notice_is_sent_once() {
        let (connection, mut client) = pair();
        assert!(connection.notify_shutdown().expect("first notice"));
        assert!(!connection.notify_shutdown().expect("second notice"));
        connection.close();
        assert_eq!(read_available(&mut client), SHUTDOWN_NOTICE.to_vec());
    }

    #[test]
    fn send_after_close_fails() {
        let (connection, _client) = pair();
        connection.close();
        let error = connection.send(b"{}").expect_err("send should fail");
        assert_eq!(error.kind(), io::ErrorKind::NotConnected);
        assert!(!connection.notify_shutdown().expect("skip notice"));
    }

    #[test]
    fn drain_returns_after_timeout() {
        let (connection, _client) = pair();
        let started = std::time::Instant::now();
        connection.drain(Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}

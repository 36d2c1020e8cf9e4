//! Test helpers for the transport module.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Deserializer, Value, json};

use super::{Reply, RequestHandler};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Echoes each valid document back as `{"echo": <document>}`.
///
/// Undecodable input is answered with `{"rejected": <byte count>}` and closes
/// the connection.
pub(crate) struct EchoHandler;

impl RequestHandler for EchoHandler {
    fn handle(&self, request: &[u8]) -> Reply {
        match serde_json::from_slice::<Value>(request) {
            Ok(value) => Reply::keep_open(json!({ "echo": value }).to_string().into_bytes()),
            Err(_) => Reply::close_after(json!({ "rejected": request.len() }).to_string().into_bytes()),
        }
    }
}

/// Reads until the peer closes, then decodes every concatenated document.
pub(crate) fn read_documents(client: &mut UnixStream) -> Vec<Value> {
    client
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .expect("client timeout");
    let mut received = Vec::new();
    let mut buffer = [0_u8; 4096];
    loop {
        match client.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => received.extend_from_slice(&buffer[..read]),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) if error.kind() == io::ErrorKind::ConnectionReset => break,
            Err(error) => panic!("client read failed: {error}"),
        }
    }
    Deserializer::from_slice(&received)
        .into_iter::<Value>()
        .collect::<Result<_, _>>()
        .expect("decode documents")
}

/// Blocking client speaking the daemon's framing.
pub(crate) struct TestClient {
    stream: UnixStream,
    pending: Vec<u8>,
}

impl TestClient {
    /// Connects to `path`, retrying briefly while the server starts.
    pub(crate) fn connect(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let deadline = Instant::now() + CLIENT_TIMEOUT;
        loop {
            match UnixStream::connect(path) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(CLIENT_TIMEOUT))
                        .expect("client timeout");
                    return Self {
                        stream,
                        pending: Vec::new(),
                    };
                }
                Err(_) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                Err(error) => panic!("connect to {}: {error}", path.display()),
            }
        }
    }

    pub(crate) fn send(&mut self, request: &Value) {
        self.send_raw(request.to_string().as_bytes());
    }

    pub(crate) fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).expect("write request");
    }

    /// Next document from the server, or `None` once the server closed.
    pub(crate) fn receive(&mut self) -> Option<Value> {
        let mut buffer = [0_u8; 4096];
        loop {
            let parsed = {
                let mut documents = Deserializer::from_slice(&self.pending).into_iter::<Value>();
                match documents.next() {
                    Some(Ok(value)) => Some((value, documents.byte_offset())),
                    _ => None,
                }
            };
            if let Some((value, end)) = parsed {
                self.pending.drain(..end);
                return Some(value);
            }
            match self.stream.read(&mut buffer) {
                Ok(0) => return None,
                Ok(read) => self.pending.extend_from_slice(&buffer[..read]),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) if error.kind() == io::ErrorKind::ConnectionReset => return None,
                Err(error) => panic!("client read failed: {error}"),
            }
        }
    }

    /// Sends `request` and waits for its response.
    pub(crate) fn call(&mut self, request: &Value) -> Value {
        self.send(request);
        self.receive().expect("response before close")
    }

    /// Returns `true` when the server has closed the connection.
    pub(crate) fn is_closed(&mut self) -> bool {
        self.receive().is_none()
    }
}

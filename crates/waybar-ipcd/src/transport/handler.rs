//! Request handling seam between client sessions and dispatch.

/// Encoded reply to a single request document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    body: Vec<u8>,
    close: bool,
}

impl Reply {
    /// Reply after which the session keeps reading.
    #[must_use]
    pub fn keep_open(body: Vec<u8>) -> Self {
        Self { body, close: false }
    }

    /// Reply after which the session closes the connection.
    #[must_use]
    pub fn close_after(body: Vec<u8>) -> Self {
        Self { body, close: true }
    }

    /// Bytes written to the client.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns `true` when the connection ends after this reply.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        self.close
    }
}

/// Answers request documents received by client sessions.
///
/// Sessions call [`RequestHandler::handle`] once per complete JSON document,
/// and also with the leftover bytes of a malformed or truncated document so
/// the handler can produce the rejection envelope.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handles one request. Implementations should avoid panicking.
    fn handle(&self, request: &[u8]) -> Reply;
}

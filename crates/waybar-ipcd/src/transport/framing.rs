//! Splits a byte stream into concatenated JSON documents.
//!
//! Requests carry no delimiter; a document ends where its top-level JSON value
//! ends. Bytes accumulate until the decoder recognises a complete value, which
//! is split off together with any leading whitespace.

use serde::de::IgnoredAny;
use serde_json::Deserializer;

/// Largest incomplete document kept in memory.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Next unit of work found in the buffered bytes.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// A complete JSON document.
    Complete(Vec<u8>),
    /// Bytes that can never form a valid document.
    Rejected(Vec<u8>),
    /// More bytes are needed.
    Pending,
}

enum Scan {
    Empty,
    Complete(usize),
    Incomplete,
    Malformed,
}

/// Accumulates request bytes across reads.
#[derive(Debug, Default)]
pub(crate) struct RequestFramer {
    pending: Vec<u8>,
}

impl RequestFramer {
    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Returns `true` while part of a document is buffered.
    pub(crate) fn has_partial(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Removes and returns everything buffered.
    pub(crate) fn take_partial(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn next_frame(&mut self) -> Frame {
        match self.scan() {
            Scan::Empty => {
                self.pending.clear();
                Frame::Pending
            }
            Scan::Complete(end) => Frame::Complete(self.pending.drain(..end).collect()),
            Scan::Incomplete if self.pending.len() > MAX_REQUEST_BYTES => {
                Frame::Rejected(self.take_partial())
            }
            Scan::Incomplete => Frame::Pending,
            Scan::Malformed => Frame::Rejected(self.take_partial()),
        }
    }

    fn scan(&self) -> Scan {
        let mut documents = Deserializer::from_slice(&self.pending).into_iter::<IgnoredAny>();
        match documents.next() {
            None => Scan::Empty,
            Some(Ok(_)) => Scan::Complete(documents.byte_offset()),
            Some(Err(error)) if error.is_eof() => Scan::Incomplete,
            Some(Err(_)) => Scan::Malformed,
        }
    }
}

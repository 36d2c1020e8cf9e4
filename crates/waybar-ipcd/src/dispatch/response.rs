//! Response envelope encoding.
//!
//! Success responses are the method's own JSON object. Failures use
//! `{"success": false, "error": <message>}`. Either kind gains a `request_id`
//! field when the request supplied one.

use serde_json::{Map, Value};

use super::errors::DispatchError;

const ENCODE_FAILURE: &[u8] = br#"{"success":false,"error":"Server error: failed to encode response"}"#;

/// A response envelope ready to be written to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    fields: Map<String, Value>,
}

impl Response {
    /// Wraps a method's result object.
    #[must_use]
    pub fn success(body: Map<String, Value>) -> Self {
        Self { fields: body }
    }

    /// Builds the failure envelope for `error`.
    #[must_use]
    pub fn error(error: &DispatchError) -> Self {
        let mut fields = Map::new();
        fields.insert("success".to_owned(), Value::Bool(false));
        fields.insert("error".to_owned(), Value::String(error.to_string()));
        Self { fields }
    }

    /// Attaches the caller's correlation value, replacing any the body set.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<Value>) -> Self {
        if let Some(id) = request_id {
            self.fields.insert("request_id".to_owned(), id);
        }
        self
    }

    /// Envelope fields.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Encodes the envelope as compact JSON without a trailing delimiter.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.fields).unwrap_or_else(|_| ENCODE_FAILURE.to_vec())
    }
}

impl From<Response> for Value {
    fn from(response: Response) -> Self {
        Self::Object(response.fields)
    }
}

//! Request envelope decoding.
//!
//! Requests are JSON objects with a `method` name, optional positional `args`
//! and an optional `request_id` that is echoed back unchanged. Decoding is
//! lenient: any JSON value produces a [`Request`], and the field checks happen
//! when the dispatcher asks for the method name or the arguments.

use serde_json::Value;

use super::errors::DispatchError;

/// Decoded request envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Option<Value>,
    args: Option<Value>,
    request_id: Option<Value>,
}

impl Request {
    /// Extracts the envelope fields from a decoded JSON document.
    ///
    /// Documents that are not objects carry no fields at all.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self {
                method: None,
                args: None,
                request_id: None,
            };
        };
        Self {
            method: fields.remove("method"),
            args: fields.remove("args"),
            request_id: fields.remove("request_id").filter(|id| !id.is_null()),
        }
    }

    /// Returns the method name to look up.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MissingMethod`] when the field is absent, null
    /// or an empty string, and [`DispatchError::UnknownMethod`] when it holds
    /// a non-string value.
    pub fn method_name(&self) -> Result<&str, DispatchError> {
        match &self.method {
            None | Some(Value::Null) => Err(DispatchError::MissingMethod),
            Some(Value::String(name)) if name.is_empty() => Err(DispatchError::MissingMethod),
            Some(Value::String(name)) => Ok(name),
            Some(other) => Err(DispatchError::unknown_method(other.to_string())),
        }
    }

    /// Returns the positional arguments; absent or null `args` means none.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when `args` is not an array.
    pub fn arguments(&self) -> Result<&[Value], String> {
        match &self.args {
            None | Some(Value::Null) => Ok(&[]),
            Some(Value::Array(values)) => Ok(values),
            Some(_) => Err("arguments must be a JSON array".to_owned()),
        }
    }

    /// Arguments rendered as compact JSON for error messages.
    #[must_use]
    pub fn arguments_text(&self) -> String {
        match &self.args {
            None | Some(Value::Null) => "[]".to_owned(),
            Some(value) => value.to_string(),
        }
    }

    /// Caller-supplied correlation value, when present and non-null.
    #[must_use]
    pub fn request_id(&self) -> Option<&Value> {
        self.request_id.as_ref()
    }
}

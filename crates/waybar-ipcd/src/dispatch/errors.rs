//! Client-facing dispatch failures.
//!
//! Every variant renders to the exact text placed in the `error` field of the
//! response envelope, so the `Display` strings are part of the wire protocol.

use thiserror::Error;

/// Reasons a request could not be answered with a method result.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request bytes are not a JSON document.
    #[error("Invalid JSON format")]
    InvalidJson {
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The request carries no usable method name.
    #[error("No 'method' provided.")]
    MissingMethod,

    /// No handler is registered under the requested name.
    #[error("No such method: '{method}'")]
    UnknownMethod { method: String },

    /// The arguments do not fit the handler.
    #[error("Invalid arguments '{args}' for method '{method}': {detail}")]
    InvalidArguments {
        args: String,
        method: String,
        detail: String,
    },

    /// The handler ran and failed.
    #[error("Method '{method}' failed: {detail}")]
    MethodFailed { method: String, detail: String },
}

impl DispatchError {
    /// Creates an invalid JSON error from a decoder failure.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::InvalidJson {
            source: Some(source),
        }
    }

    /// Creates an unknown method error.
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }

    /// Creates an invalid arguments error.
    pub fn invalid_arguments(
        args: impl Into<String>,
        method: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidArguments {
            args: args.into(),
            method: method.into(),
            detail: detail.into(),
        }
    }

    /// Creates a method failure error.
    pub fn method_failed(method: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MethodFailed {
            method: method.into(),
            detail: detail.into(),
        }
    }

    /// Returns `true` when the connection must be closed after replying.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        matches!(self, Self::InvalidJson { .. })
    }
}

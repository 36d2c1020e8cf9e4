//! Request handler that routes envelopes to registered methods.
//!
//! The [`Dispatcher`] turns one complete request document into exactly one
//! response envelope. It implements the transport's
//! [`RequestHandler`](crate::transport::RequestHandler) seam so client
//! sessions never see method names or envelope fields.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::methods::{Method, MethodError, MethodRegistry};
use crate::transport::{Reply, RequestHandler};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::request::Request;
use super::response::Response;

/// Result of handling one request document.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    response: Response,
    close: bool,
}

impl DispatchOutcome {
    /// Envelope to send to the client.
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Returns `true` when the session must end after sending the response.
    #[must_use]
    pub fn closes_connection(&self) -> bool {
        self.close
    }
}

/// Routes requests to handlers in a [`MethodRegistry`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        Self { registry }
    }

    /// Decodes `raw` and produces the response envelope.
    ///
    /// Undecodable input yields the `Invalid JSON format` envelope and asks
    /// the caller to close the connection. Every other failure is reported in
    /// the envelope and leaves the connection open.
    #[must_use]
    pub fn handle(&self, raw: &[u8]) -> DispatchOutcome {
        let value: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(source) => {
                let error = DispatchError::from_json_error(source);
                warn!(target: DISPATCH_TARGET, %error, bytes = raw.len(), "rejecting request");
                return DispatchOutcome {
                    response: Response::error(&error),
                    close: error.closes_connection(),
                };
            }
        };

        let request = Request::from_value(value);
        let response = match self.dispatch(&request) {
            Ok(body) => Response::success(body),
            Err(error) => {
                debug!(target: DISPATCH_TARGET, %error, "request failed");
                Response::error(&error)
            }
        };

        DispatchOutcome {
            response: response.with_request_id(request.request_id().cloned()),
            close: false,
        }
    }

    /// Resolves and invokes the method named by `request`.
    ///
    /// # Errors
    ///
    /// Returns the client-facing failure when the method is missing or
    /// unknown, when the arguments are rejected, or when the handler fails.
    pub fn dispatch(&self, request: &Request) -> Result<Map<String, Value>, DispatchError> {
        let name = request.method_name()?;
        let method = self
            .registry
            .lookup(name)
            .ok_or_else(|| DispatchError::unknown_method(name))?;
        let args = request.arguments().map_err(|detail| {
            DispatchError::invalid_arguments(request.arguments_text(), name, detail)
        })?;

        debug!(target: DISPATCH_TARGET, method = name, args = args.len(), "dispatching request");
        invoke(method, args).map_err(|failure| match failure {
            Failure::Method(MethodError::InvalidArguments { detail }) => {
                DispatchError::invalid_arguments(request.arguments_text(), name, detail)
            }
            Failure::Method(MethodError::Failed { detail }) => {
                DispatchError::method_failed(name, detail)
            }
            Failure::Panicked(detail) => {
                warn!(target: DISPATCH_TARGET, method = name, %detail, "method handler panicked");
                DispatchError::method_failed(name, "handler panicked")
            }
        })
    }
}

impl RequestHandler for Dispatcher {
    fn handle(&self, request: &[u8]) -> Reply {
        let outcome = Dispatcher::handle(self, request);
        let body = outcome.response.to_bytes();
        if outcome.close {
            Reply::close_after(body)
        } else {
            Reply::keep_open(body)
        }
    }
}

enum Failure {
    Method(MethodError),
    Panicked(String),
}

fn invoke(method: &dyn Method, args: &[Value]) -> Result<Map<String, Value>, Failure> {
    match panic::catch_unwind(AssertUnwindSafe(|| method.call(args))) {
        Ok(result) => result.map_err(Failure::Method),
        Err(payload) => Err(Failure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

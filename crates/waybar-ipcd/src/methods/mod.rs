//! Named method handlers served over the socket.
//!
//! A [`Method`] receives the request's positional arguments as JSON values
//! and returns the JSON object that becomes the response body. Handlers
//! report two distinguishable failure kinds through [`MethodError`]: an
//! argument mismatch, and a general execution failure.
//!
//! Handlers are collected once into an immutable [`MethodRegistry`] which the
//! dispatcher consults for every request.

mod registry;
mod updates;

use serde_json::{Map, Value};
use thiserror::Error;

pub use self::registry::{MethodRegistry, MethodRegistryBuilder, RegistryError};
pub use self::updates::{CommandOutput, CommandRunner, ListUpdates, SystemCommandRunner};

/// Tracing target for method handlers.
pub(crate) const METHODS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::methods");

/// Result returned by a method handler.
pub type MethodResult = Result<Map<String, Value>, MethodError>;

/// A callable registered under a method name.
///
/// Implementations may block (for example on a subprocess); the daemon calls
/// each handler synchronously on the requesting client's session thread.
#[cfg_attr(test, mockall::automock)]
pub trait Method: Send + Sync {
    /// Invokes the handler with positional arguments.
    fn call(&self, args: &[Value]) -> MethodResult;
}

impl<F> Method for F
where
    F: Fn(&[Value]) -> MethodResult + Send + Sync,
{
    fn call(&self, args: &[Value]) -> MethodResult {
        self(args)
    }
}

/// Failures a handler can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MethodError {
    /// The arguments do not match what the handler accepts.
    #[error("{detail}")]
    InvalidArguments { detail: String },
    /// The handler ran but could not complete.
    #[error("{detail}")]
    Failed { detail: String },
}

impl MethodError {
    /// Creates an argument mismatch error.
    pub fn invalid_arguments(detail: impl Into<String>) -> Self {
        Self::InvalidArguments {
            detail: detail.into(),
        }
    }

    /// Creates an execution failure.
    pub fn failed(detail: impl Into<String>) -> Self {
        Self::Failed {
            detail: detail.into(),
        }
    }
}

/// Rejects argument lists whose length differs from `expected`.
pub fn expect_arity(args: &[Value], expected: usize) -> Result<(), MethodError> {
    if args.len() == expected {
        return Ok(());
    }
    let noun = if expected == 1 { "argument" } else { "arguments" };
    Err(MethodError::invalid_arguments(format!(
        "takes {expected} positional {noun} but {given} were given",
        given = args.len()
    )))
}

/// Builds the registry of methods shipped with the daemon.
pub fn default_registry() -> Result<MethodRegistry, RegistryError> {
    Ok(MethodRegistry::builder()
        .register(
            ListUpdates::<SystemCommandRunner>::NAME,
            ListUpdates::new(SystemCommandRunner),
        )?
        .build())
}

//! Unix socket IPC daemon for waybar modules.
//!
//! The daemon listens on a Unix domain socket for concatenated JSON requests of
//! the form `{"method": "...", "args": [...], "request_id": ...}` and answers
//! each with a JSON object carrying a `success` flag. Methods live in a
//! [`MethodRegistry`] fixed at startup; the [`Dispatcher`] turns malformed or
//! failing requests into error envelopes instead of tearing the session down.
//!
//! The runtime is thread based: one accept loop plus one thread per client
//! session. On SIGTERM, SIGINT, SIGQUIT or SIGHUP every connected client
//! receives a shutdown notice, connections are closed and the socket file is
//! removed before the process exits.
//!
//! Socket location, permissions and ownership come from
//! [`waybar_ipc_config`]. Structured logs are written to stderr through
//! `tracing`; see [`telemetry`].

pub mod dispatch;
pub mod methods;
mod process;
pub mod telemetry;
mod transport;

pub use dispatch::{DispatchError, DispatchOutcome, Dispatcher, Request, Response};
pub use methods::{
    CommandOutput, CommandRunner, ListUpdates, Method, MethodError, MethodRegistry,
    MethodRegistryBuilder, MethodResult, RegistryError, SystemCommandRunner, default_registry,
    expect_arity,
};
pub use process::{
    ConfigLoader, LaunchError, ShutdownError, ShutdownSignal, StaticConfigLoader,
    SystemConfigLoader, SystemShutdownSignal, run_daemon,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ListenerError, PermissionError, Reply, RequestHandler, ServerHandle, ShutdownTrigger,
    SocketListener,
};

#[cfg(test)]
mod tests;

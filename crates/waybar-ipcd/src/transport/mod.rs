//! Unix domain socket transport for the daemon.
//!
//! The listener binds the configured socket path and accepts connections on a
//! background thread. Each client is served by its own session thread, which
//! frames concatenated JSON documents and passes them to a
//! [`RequestHandler`]. A registry of live connections lets shutdown notify and
//! close every client.

mod connection;
mod errors;
mod framing;
mod handler;
mod lifecycle;
mod listener;
mod permissions;
mod registry;
mod session;
#[cfg(test)]
pub(crate) mod test_utils;

pub use self::errors::{ListenerError, PermissionError};
pub use self::handler::{Reply, RequestHandler};
pub use self::lifecycle::{ServerHandle, ShutdownTrigger};
pub use self::listener::SocketListener;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

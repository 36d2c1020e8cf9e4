//! JSON request dispatch for the method socket.
//!
//! Each request is a single JSON object:
//!
//! ```json
//! {"method": "list_updates", "args": [], "request_id": 7}
//! ```
//!
//! The daemon answers with the method's result object, or with a failure
//! envelope naming what went wrong:
//!
//! ```json
//! {"success": false, "error": "No such method: 'nope'", "request_id": 7}
//! ```
//!
//! `args` is optional and defaults to an empty list. `request_id` is optional
//! and, when present, is copied verbatim into the response.

mod errors;
mod handler;
mod request;
mod response;

pub use self::errors::DispatchError;
pub use self::handler::{DispatchOutcome, Dispatcher};
pub use self::request::Request;
pub use self::response::Response;

/// Tracing target for request dispatch.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

//! Loopback HTTP listener for the command server.
//!
//! The transport binds the configured endpoint and serves requests one at a
//! time on a background thread. Each request is handed to a
//! [`RequestHandler`], which never touches server state directly.

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub use self::handler::{Flow, RequestHandler};
pub use self::listener::{HttpListener, ListenerHandle};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, send_request};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

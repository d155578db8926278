//! Command dispatch: gate, route resolution, handler invocation and
//! response envelopes.
//!
//! ## Protocol
//!
//! Clients send one HTTP request per command. The path names the command,
//! the `X-AI-Token` header carries the shared secret and the body, if any,
//! is a JSON object:
//!
//! ```text
//! POST /set-property
//! X-AI-Token: <token>
//!
//! {"path":"/Player","component":"Rigidbody","property":"mass","value":2}
//! ```
//!
//! Every response body is an [`Envelope`].
//!
//! ## Routing
//!
//! Built-in commands are resolved first and cannot be shadowed. Remaining
//! names go through the [`RouteRegistry`], seeded from
//! [`commands::standard_routes`] and extended by hot-reloaded code.

pub mod commands;
mod builtins;
mod errors;
mod gate;
mod handler;
mod registry;
mod request;
mod response;
mod router;

pub use self::errors::CommandError;
pub use self::gate::Gate;
pub use self::handler::{MAX_BODY_BYTES, MarshalingHandler};
pub use self::registry::{Builtin, Handler, Resolved, RouteEntry, RouteRegistry};
pub use self::request::{CommandRequest, TOKEN_HEADER, command_name, parse_body};
pub use self::response::{Envelope, Reply};
pub use self::router::dispatch;

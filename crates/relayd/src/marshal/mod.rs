//! Hand-off of work onto the single execution thread.
//!
//! Every piece of server state lives on one thread. Other threads reach it by
//! submitting closures through a [`Marshaler`]; the owning thread drains them
//! from an [`Executor`], either once per host frame via [`Executor::drain`] or
//! continuously via [`Executor::run_until`]. At most one job runs at a time.

mod errors;
mod executor;

pub use self::errors::MarshalError;
pub use self::executor::{Executor, ExecutorHandle, Inbox, Marshaler, channel, spawn};
pub(crate) use self::executor::panic_message;

pub(crate) const MARSHAL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::marshal");

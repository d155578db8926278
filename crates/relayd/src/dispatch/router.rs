//! Gate, resolve, invoke, envelope.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, warn};

use super::builtins;
use super::errors::CommandError;
use super::registry::Resolved;
use super::request::CommandRequest;
use super::response::Reply;
use crate::context::ServerContext;
use crate::marshal::panic_message;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

struct Executed {
    data: Value,
    mutating: bool,
}

/// Runs one request against the server state. Must be called on the
/// execution thread.
///
/// Never fails: every outcome, including a panicking handler, becomes a
/// [`Reply`]. A successful mutating command is followed by an auto-commit.
pub fn dispatch(ctx: &mut ServerContext, request: &CommandRequest) -> Reply {
    let started = Instant::now();
    let name = request.name();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| execute(ctx, request)));
    let reply = match outcome {
        Ok(Ok(executed)) => {
            if executed.mutating {
                ctx.auto_commit(name);
            }
            Reply::ok(executed.data)
        }
        Ok(Err(failure)) => {
            match &failure {
                CommandError::Unauthorized | CommandError::Disabled => warn!(
                    target: DISPATCH_TARGET,
                    command = name,
                    reason = %failure,
                    "request denied"
                ),
                CommandError::Internal { .. } => error!(
                    target: DISPATCH_TARGET,
                    command = name,
                    error = %failure,
                    "command failed"
                ),
                _ => debug!(
                    target: DISPATCH_TARGET,
                    command = name,
                    error = %failure,
                    "command rejected"
                ),
            }
            Reply::from(failure)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                target: DISPATCH_TARGET,
                command = name,
                panic = %message,
                "command handler panicked"
            );
            Reply::from(CommandError::internal(message))
        }
    };
    debug!(
        target: DISPATCH_TARGET,
        command = name,
        status = reply.status(),
        elapsed_ms = started.elapsed().as_millis(),
        "request handled"
    );
    reply
}

fn execute(ctx: &mut ServerContext, request: &CommandRequest) -> Result<Executed, CommandError> {
    ctx.gate.check(request.token())?;
    match ctx.registry.resolve(request.name())? {
        Resolved::Builtin(builtin) => Ok(Executed {
            data: builtins::run(builtin, ctx)?,
            mutating: false,
        }),
        Resolved::Route(entry) => {
            let mut command_ctx = ctx.command_context();
            let data = entry.invoke(&mut command_ctx, request.body())?;
            Ok(Executed {
                data,
                mutating: entry.is_mutating(),
            })
        }
    }
}

//! Commands served by the server itself rather than the route table.

use std::thread;
use std::time::Instant;

use serde_json::{Value, json};
use tracing::info;

use super::errors::CommandError;
use super::registry::Builtin;
use super::router::DISPATCH_TARGET;
use crate::context::ServerContext;

pub(crate) fn run(builtin: Builtin, ctx: &mut ServerContext) -> Result<Value, CommandError> {
    match builtin {
        Builtin::Ping => Ok(json!("pong")),
        Builtin::Reindex => Ok(json!(ctx.reindex())),
        Builtin::GetState => Ok(json!({
            "compiling": ctx.host.compiler.is_compiling(),
            "routeCount": ctx.registry.len(),
            "enabled": ctx.gate.is_enabled(),
        })),
        Builtin::WaitForCompile => Ok(wait_for_compile(ctx)),
        Builtin::PanicOn => Ok(set_enabled(ctx, false)),
        Builtin::PanicOff => Ok(set_enabled(ctx, true)),
        Builtin::IndexProject => {
            let index = ctx.host.scene.index_project()?;
            ctx.memory.write_index(&index)?;
            serde_json::to_value(index).map_err(|error| CommandError::internal(error.to_string()))
        }
    }
}

/// Blocks the execution thread until the compiler is idle or the wait limit
/// passes. An idle compiler's output is then reloaded; otherwise the
/// existing handlers are simply reindexed.
fn wait_for_compile(ctx: &mut ServerContext) -> Value {
    let deadline = Instant::now() + ctx.compile_wait_limit;
    while ctx.host.compiler.is_compiling() && Instant::now() < deadline {
        thread::sleep(ctx.compile_poll);
    }
    let compiling = ctx.host.compiler.is_compiling();
    let route_count = if compiling {
        ctx.reindex()
    } else {
        let outcome = ctx.host.compiler.reload();
        ctx.apply_reload(outcome)
    };
    json!({ "compiling": compiling, "routeCount": route_count })
}

fn set_enabled(ctx: &mut ServerContext, enabled: bool) -> Value {
    ctx.gate.set_enabled(enabled);
    info!(
        target: DISPATCH_TARGET,
        enabled,
        "kill switch changed"
    );
    json!({ "enabled": enabled })
}

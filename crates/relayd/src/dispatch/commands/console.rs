use serde::Deserialize;
use serde_json::Value;

use crate::console::{LevelFilter, snapshot};
use crate::context::CommandContext;
use crate::dispatch::CommandError;

#[derive(Debug, Deserialize)]
pub(super) struct ConsoleRead {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    level: LevelFilter,
}

pub(super) fn read(ctx: &mut CommandContext<'_>, args: ConsoleRead) -> Result<Value, CommandError> {
    let snap = snapshot(ctx.console(), args.limit, args.level);
    serde_json::to_value(snap).map_err(|error| CommandError::internal(error.to_string()))
}

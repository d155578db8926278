use serde::Deserialize;
use serde_json::{Value, json};

use crate::context::CommandContext;
use crate::dispatch::CommandError;
use crate::host::BuildRequest;

#[derive(Debug, Deserialize)]
pub(super) struct BuildScenes {
    scenes: Vec<String>,
}

pub(super) fn set_build_scenes(
    ctx: &mut CommandContext<'_>,
    args: BuildScenes,
) -> Result<Value, CommandError> {
    let count = ctx.build().set_build_scenes(&args.scenes)?;
    Ok(json!({ "count": count }))
}

pub(super) fn build_player(
    ctx: &mut CommandContext<'_>,
    args: BuildRequest,
) -> Result<Value, CommandError> {
    let report = ctx.build().build_player(&args)?;
    serde_json::to_value(report).map_err(|error| CommandError::internal(error.to_string()))
}

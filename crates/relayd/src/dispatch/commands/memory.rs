use serde::Deserialize;
use serde_json::{Value, json};

use crate::context::CommandContext;
use crate::dispatch::CommandError;

const DEFAULT_READ_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub(super) struct Append {
    stream: String,
    entry: Value,
}

pub(super) fn append(ctx: &mut CommandContext<'_>, args: Append) -> Result<Value, CommandError> {
    ctx.memory().append(&args.stream, &args.entry)?;
    Ok(json!("ok"))
}

#[derive(Debug, Deserialize)]
pub(super) struct Read {
    stream: String,
    #[serde(default)]
    limit: Option<usize>,
}

pub(super) fn read(ctx: &mut CommandContext<'_>, args: Read) -> Result<Value, CommandError> {
    let entries = ctx
        .memory()
        .tail(&args.stream, args.limit.unwrap_or(DEFAULT_READ_LIMIT))?;
    Ok(json!({ "stream": args.stream, "entries": entries }))
}

#[derive(Debug, Deserialize)]
pub(super) struct KvSet {
    key: String,
    value: String,
}

pub(super) fn kv_set(ctx: &mut CommandContext<'_>, args: KvSet) -> Result<Value, CommandError> {
    ctx.memory().kv_set(&args.key, &args.value)?;
    Ok(json!("ok"))
}

#[derive(Debug, Deserialize)]
pub(super) struct KvGet {
    key: String,
}

pub(super) fn kv_get(ctx: &mut CommandContext<'_>, args: KvGet) -> Result<Value, CommandError> {
    Ok(Value::String(ctx.memory().kv_get(&args.key)?))
}

use serde::Deserialize;
use serde_json::Value;

use crate::context::CommandContext;
use crate::dispatch::CommandError;
use crate::test_bridge::TestMode;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RunTests {
    #[serde(default)]
    mode: TestMode,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

pub(super) fn run_tests(ctx: &mut CommandContext<'_>, args: RunTests) -> Result<Value, CommandError> {
    let bridge = ctx.bridge();
    let timeout = bridge.effective_timeout(args.timeout_seconds);
    let summary = bridge.run(ctx.tests(), args.mode, timeout)?;
    serde_json::to_value(summary).map_err(|error| CommandError::internal(error.to_string()))
}

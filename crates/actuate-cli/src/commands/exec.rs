//! Execute an action from structured arguments

use crate::cli::{RunArgs, TargetArgs};
use crate::commands::{bootstrap, report};
use crate::error::CliResult;
use crate::utils::{parse_binding, parse_key_value};
use actuate_config::RuntimeSettings;
use actuate_core::{CommandQueryParams, EnvironmentId, ExecuteActionRequest, OldParam, ViewMode};
use std::time::Duration;
use tracing::info;

pub async fn execute(
    settings: &RuntimeSettings,
    target: TargetArgs,
    query: Vec<String>,
    header: Vec<String>,
    bindings: Vec<String>,
    run: RunArgs,
) -> CliResult<()> {
    let solution = bootstrap(settings, &target.definitions).await?;

    let query = to_params(&query)?;
    let header = to_params(&header)?;
    let mut request = ExecuteActionRequest::new(target.action_id.as_str())
        .with_params(CommandQueryParams::new(query, header))
        .with_view_mode(ViewMode::from_flag(target.view));
    for raw in &bindings {
        let (name, value) = parse_binding(raw)?;
        request = request.with_binding(name, value);
    }
    if let Some(branch) = target.branch.clone() {
        request = request.with_branch(branch);
    }
    if run.lenient {
        request = request.lenient();
    }
    if let Some(ms) = run.timeout_ms {
        request = request.with_timeout(Duration::from_millis(ms));
    }

    info!(action_id = %target.action_id, branch = ?target.branch, "Executing action");
    let result = solution
        .execute_structured(request, &EnvironmentId::new(target.environment))
        .await?;
    report(result, &run)
}

fn to_params(raw: &[String]) -> CliResult<Vec<OldParam>> {
    raw.iter()
        .map(|entry| parse_key_value(entry).map(|(name, value)| OldParam::new(name, value)))
        .collect()
}

//! Execute an action through the multipart upload path

use crate::cli::{RunArgs, TargetArgs};
use crate::commands::{bootstrap, report};
use crate::error::{CliError, CliResult};
use crate::utils::{parse_key_value, validate_file_exists};
use actuate_config::RuntimeSettings;
use actuate_core::EnvironmentId;
use actuate_runtime::{
    part_stream, RuntimeError, UploadedPart, EXECUTE_ACTION_DTO_PART, PARAMETER_MAP_PART,
};
use futures::TryStreamExt;
use serde_json::{json, Map, Value as JsonValue};
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::info;

pub async fn execute(
    settings: &RuntimeSettings,
    target: TargetArgs,
    fields: Vec<String>,
    files: Vec<String>,
    parameter_map: Vec<String>,
    run: RunArgs,
) -> CliResult<()> {
    let solution = bootstrap(settings, &target.definitions).await?;

    let mut descriptor = json!({
        "actionId": target.action_id,
        "viewMode": target.view,
    });
    if run.lenient {
        descriptor["substitutionMode"] = json!("lenient");
    }
    if let Some(ms) = run.timeout_ms {
        descriptor["timeoutMs"] = json!(ms);
    }

    let mut parts = vec![UploadedPart::json(EXECUTE_ACTION_DTO_PART, &descriptor)];
    if !parameter_map.is_empty() {
        let mut map = Map::new();
        for raw in &parameter_map {
            let (key, part) = parse_key_value(raw)?;
            map.insert(key, JsonValue::String(part));
        }
        parts.push(UploadedPart::json(PARAMETER_MAP_PART, &JsonValue::Object(map)));
    }
    for raw in &fields {
        let (name, value) = parse_key_value(raw)?;
        parts.push(UploadedPart::text(name, value));
    }
    for raw in &files {
        let (name, path) = parse_key_value(raw)?;
        parts.push(file_part(name, &path).await?);
    }

    info!(action_id = %target.action_id, parts = parts.len(), "Uploading action parts");
    let result = solution
        .execute_from_upload(
            part_stream(parts),
            target.branch.as_deref(),
            &EnvironmentId::new(target.environment),
        )
        .await?;
    report(result, &run)
}

/// File part whose body streams from disk
async fn file_part(name: String, path: &str) -> CliResult<UploadedPart> {
    validate_file_exists(path)?;
    let file = tokio::fs::File::open(path).await?;
    let filename = Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::InvalidArgument(format!("'{}' has no file name", path)))?;
    let body = ReaderStream::new(file).map_err(RuntimeError::from);
    Ok(UploadedPart::new(name, Some(filename), Some(guess_content_type(path).to_string()), body))
}

fn guess_content_type(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

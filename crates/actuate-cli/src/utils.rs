//! Utility functions for the CLI

use crate::error::{CliError, CliResult};
use colored::{ColoredString, Colorize};
use serde_json::Value as JsonValue;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize tracing; `RUST_LOG` wins over the verbosity flag
pub fn init_tracing(verbose: bool) -> CliResult<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CliError::General(format!("Failed to set tracing subscriber: {}", e)))?;

    Ok(())
}

/// Utility for colored console output
pub struct ColoredOutput;

impl ColoredOutput {
    pub fn success(msg: &str) -> ColoredString {
        msg.green().bold()
    }

    pub fn error(msg: &str) -> ColoredString {
        msg.red().bold()
    }

    pub fn warning(msg: &str) -> ColoredString {
        msg.yellow().bold()
    }
}

/// Split `name=value`; the name must be non-empty
pub fn parse_key_value(raw: &str) -> CliResult<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidArgument(format!("Expected NAME=VALUE, got '{}'", raw))),
    }
}

/// `name=value` where the value keeps its JSON type when it parses as JSON
pub fn parse_binding(raw: &str) -> CliResult<(String, JsonValue)> {
    let (name, value) = parse_key_value(raw)?;
    let value = serde_json::from_str(&value).unwrap_or(JsonValue::String(value));
    Ok((name, value))
}

/// Validate file exists
pub fn validate_file_exists(path: &str) -> CliResult<()> {
    if !std::path::Path::new(path).exists() {
        return Err(CliError::FileNotFound(path.to_string()));
    }
    Ok(())
}

/// Read a JSON or YAML document
pub fn read_document(path: &str) -> CliResult<JsonValue> {
    validate_file_exists(path)?;
    let content = std::fs::read_to_string(path)?;
    if let Ok(json_data) = serde_json::from_str::<JsonValue>(&content) {
        return Ok(json_data);
    }
    serde_yaml::from_str(&content).map_err(|e| {
        CliError::InvalidArgument(format!("Invalid JSON/YAML file '{}': {}", path, e))
    })
}

/// Write output data to a file, creating parent directories
pub fn write_output_data(file_path: &str, content: &str) -> CliResult<()> {
    let path = std::path::Path::new(file_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Print to stdout or save to `output`
pub fn emit(formatted: &str, output: Option<&str>) -> CliResult<()> {
    match output {
        Some(file) => {
            write_output_data(file, formatted)?;
            println!("{} Output written to: {}", ColoredOutput::success("✓"), file);
        }
        None => println!("{}", formatted),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bindings_keep_json_types() {
        assert_eq!(parse_binding("id=42").unwrap(), ("id".to_string(), json!(42)));
        assert_eq!(parse_binding("on=true").unwrap().1, json!(true));
        assert_eq!(parse_binding("name=alice").unwrap().1, json!("alice"));
        assert_eq!(parse_binding("q=a=b").unwrap().1, json!("a=b"));
        assert!(parse_binding("=x").is_err());
        assert!(parse_binding("novalue").is_err());
    }

    #[test]
    fn reads_yaml_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "query: \"select {{id}}\"\n").unwrap();
        let doc = read_document(path.to_str().unwrap()).unwrap();
        assert_eq!(doc, json!({"query": "select {{id}}"}));
        assert!(matches!(read_document("/no/such/file"), Err(CliError::FileNotFound(_))));
    }
}

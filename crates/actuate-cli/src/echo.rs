//! Built-in `echo` plugin: answers with what it would have sent to a backend

use actuate_core::{redact_all, sanitize_json_value, PluginKind};
use actuate_registry::{
    ExecutorError, ExecutorInput, ExecutorOutput, ExecutorRegistry, ExecutorResult,
    PluginExecutor, PluginMetadata,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const ECHO_PLUGIN: &str = "echo";

#[derive(Debug, Default)]
pub struct EchoExecutor;

#[async_trait]
impl PluginExecutor for EchoExecutor {
    fn plugin_kind(&self) -> PluginKind {
        PluginKind::new(ECHO_PLUGIN)
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            kind: self.plugin_kind(),
            display_name: "Echo".into(),
            description: "Returns the substituted configuration without calling a backend".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    async fn execute(&self, input: ExecutorInput) -> ExecutorResult<ExecutorOutput> {
        // `sleepMs` and `failWith` let definitions exercise timeouts and failures.
        if let Some(ms) = input.configuration.get("sleepMs").and_then(|v| v.as_u64()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if let Some(message) = input.configuration.get("failWith").and_then(|v| v.as_str()) {
            return Err(ExecutorError::failed_with_code(message, "ECHO_FAILURE"));
        }

        let attachments: Vec<_> = input.attachments.iter().map(|a| a.to_binding()).collect();
        let body = json!({
            "action": input.action_name,
            "environment": input.environment_id,
            "configuration": input.configuration,
            "datasource": sanitize_json_value(&input.datasource_config),
            "credentials": redact_all(&input.credentials),
            "attachments": attachments,
        });
        Ok(ExecutorOutput::new(body)
            .with_status("200")
            .with_header("x-actuate-execution-id", json!(input.execution_id)))
    }
}

/// Registrar adding the built-in plugins
pub fn register_builtin(registry: &mut ExecutorRegistry) {
    registry.register(Arc::new(EchoExecutor));
}

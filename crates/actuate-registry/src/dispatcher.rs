//! Executor selection, deadline enforcement and result normalization

use crate::error::ExecutorError;
use crate::executor::{ExecutorInput, ExecutorOutput};
use crate::registry::ExecutorRegistry;
use actuate_core::{
    ActionConfiguration, ActionExecutionResult, AttachmentRef, ErrorDetail, ErrorKind,
    ResolvedContext,
};
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Status code reported when an executor succeeds without one of its own
const DEFAULT_SUCCESS_STATUS: &str = "200";

/// Deadline policy applied to every dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub default: Duration,
    pub max: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self { default: Duration::from_secs(10), max: Duration::from_secs(300) }
    }
}

impl TimeoutPolicy {
    /// Request override, then the action's own timeout, then the default; capped at `max`.
    /// A zero timeout from either source counts as unset.
    pub fn effective(&self, requested: Option<Duration>, action_timeout_ms: Option<u64>) -> Duration {
        requested
            .filter(|timeout| !timeout.is_zero())
            .or_else(|| action_timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis))
            .unwrap_or(self.default)
            .min(self.max)
    }
}

/// Per-invocation dispatch inputs beyond the resolved context
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    pub execution_id: Option<String>,
    pub timeout: Option<Duration>,
    pub attachments: Vec<AttachmentRef>,
    /// Warnings produced upstream (e.g. lenient substitution), copied into the result
    pub warnings: Vec<String>,
}

/// Invokes the executor registered for a datasource's plugin type.
///
/// Holds no per-invocation state; one instance serves concurrent dispatches.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ExecutorRegistry>,
    timeouts: TimeoutPolicy,
}

impl Dispatcher {
    pub fn new(registry: Arc<ExecutorRegistry>, timeouts: TimeoutPolicy) -> Self {
        Self { registry, timeouts }
    }

    pub fn registry(&self) -> &ExecutorRegistry {
        &self.registry
    }

    pub fn timeouts(&self) -> TimeoutPolicy {
        self.timeouts
    }

    /// Run the action and always return an envelope; backend failures and
    /// timeouts come back as `success == false`.
    pub async fn dispatch(
        &self,
        context: &ResolvedContext,
        configuration: ActionConfiguration,
        options: DispatchOptions,
    ) -> ActionExecutionResult {
        let execution_id =
            options.execution_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let started_at = Utc::now();
        let start = Instant::now();
        let plugin = context.plugin().clone();
        let envelope = Envelope {
            execution_id: execution_id.clone(),
            context,
            started_at,
            start,
            warnings: options.warnings,
        };

        let Some(executor) = self.registry.get(&plugin) else {
            tracing::error!(
                execution_id = %execution_id,
                plugin = %plugin,
                "No executor registered for plugin"
            );
            return envelope.failure(ErrorDetail::new(
                ErrorKind::PluginNotRegistered,
                format!("No executor registered for plugin '{}'", plugin),
            ));
        };

        let timeout = self.timeouts.effective(options.timeout, context.definition.timeout_ms);
        let input =
            ExecutorInput::from_context(execution_id.clone(), context, configuration, options.attachments);

        tracing::info!(
            execution_id = %execution_id,
            action_id = %context.action.id,
            plugin = %plugin,
            timeout_ms = timeout.as_millis() as u64,
            "Dispatching action"
        );

        // Elapsing drops the executor future, which cancels it at its current await point.
        match tokio::time::timeout(timeout, executor.execute(input)).await {
            Ok(Ok(output)) => {
                let result = envelope.success(output);
                tracing::info!(
                    execution_id = %execution_id,
                    duration_ms = result.duration_ms,
                    status_code = %result.status_code,
                    "Action execution completed successfully"
                );
                result
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    execution_id = %execution_id,
                    plugin = %plugin,
                    error = %err,
                    "Action execution failed"
                );
                envelope.failure(executor_error_detail(&err))
            }
            Err(_) => {
                tracing::warn!(
                    execution_id = %execution_id,
                    plugin = %plugin,
                    timeout_ms = timeout.as_millis() as u64,
                    "Action execution timed out; executor cancelled"
                );
                envelope.failure(ErrorDetail::new(
                    ErrorKind::ExecutionTimeout,
                    format!("Execution timed out after {}ms", timeout.as_millis()),
                ))
            }
        }
    }
}

fn executor_error_detail(err: &ExecutorError) -> ErrorDetail {
    let detail = ErrorDetail::new(ErrorKind::Executor, err.to_string());
    match err.code() {
        Some(code) => detail.with_plugin_code(code),
        None => detail,
    }
}

struct Envelope<'a> {
    execution_id: String,
    context: &'a ResolvedContext,
    started_at: chrono::DateTime<Utc>,
    start: Instant,
    warnings: Vec<String>,
}

impl Envelope<'_> {
    fn success(self, output: ExecutorOutput) -> ActionExecutionResult {
        ActionExecutionResult {
            execution_id: self.execution_id,
            action_id: self.context.action.id.clone(),
            success: true,
            status_code: output.status_code.unwrap_or_else(|| DEFAULT_SUCCESS_STATUS.to_string()),
            body: output.body,
            headers: output.headers,
            duration_ms: self.start.elapsed().as_millis() as u64,
            started_at: self.started_at,
            warnings: self.warnings,
            error: None,
        }
    }

    fn failure(self, detail: ErrorDetail) -> ActionExecutionResult {
        let status_code =
            detail.plugin_error_code.clone().unwrap_or_else(|| detail.kind.as_str().to_string());
        ActionExecutionResult {
            execution_id: self.execution_id,
            action_id: self.context.action.id.clone(),
            success: false,
            status_code,
            body: JsonValue::String(detail.message.clone()),
            headers: IndexMap::new(),
            duration_ms: self.start.elapsed().as_millis() as u64,
            started_at: self.started_at,
            warnings: self.warnings,
            error: Some(detail),
        }
    }
}

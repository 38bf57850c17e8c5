pub mod exec;
pub mod render;
pub mod upload;

use crate::cli::{OutputFormat, RunArgs};
use crate::echo::register_builtin;
use crate::error::{CliError, CliResult};
use crate::utils::{emit, validate_file_exists, ColoredOutput};
use actuate_config::{EnvResolver, ManifestLoader, RuntimeSettings};
use actuate_core::ActionExecutionResult;
use actuate_registry::ExecutorRegistry;
use actuate_runtime::{ActionExecutionSolution, DefinitionStores};
use actuate_store::MemoryStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Seed an in-memory store from a definitions file and wire the execution core
pub async fn bootstrap(
    settings: &RuntimeSettings,
    definitions: &str,
) -> CliResult<ActionExecutionSolution> {
    validate_file_exists(definitions)?;
    let manifest = ManifestLoader::new(EnvResolver::default()).load_from_file(definitions)?;
    let store = MemoryStore::new();
    store.seed(&manifest.applications, &manifest.datasources, &manifest.actions).await?;

    let registry = ExecutorRegistry::new().with_registrar(register_builtin);
    info!(plugins = ?registry.registered_plugins(), "Executor registry ready");

    let stores = DefinitionStores {
        applications: Arc::new(store.applications),
        actions: Arc::new(store.actions),
        datasources: Arc::new(store.datasources),
    };
    Ok(ActionExecutionSolution::from_settings(settings, stores, registry))
}

/// Print a result envelope; a failed execution becomes an error exit
pub fn report(result: ActionExecutionResult, run: &RunArgs) -> CliResult<()> {
    for warning in &result.warnings {
        eprintln!("{} {}", ColoredOutput::warning("Warning:"), warning);
    }
    let formatted = run.format.format_json(&serde_json::to_value(&result)?)?;
    emit(&formatted, run.output.as_deref())?;

    if result.success {
        if run.format == OutputFormat::Pretty {
            eprintln!(
                "{} {} in {}ms",
                ColoredOutput::success("✓"),
                result.action_id,
                result.duration_ms
            );
        }
        Ok(())
    } else {
        let message = result
            .error
            .map(|e| format!("{}: {}", e.kind, e.message))
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(execution_id = %result.execution_id, "Action execution failed: {}", message);
        Err(CliError::ExecutionFailed(message))
    }
}

//! Execution entry points: normalize, resolve, substitute, dispatch.

use crate::error::{RuntimeError, RuntimeResult};
use crate::normalizer::{reject_unnamed, ParameterNormalizer, ResolutionHint};
use crate::parts::PartStream;
use crate::resolver::{ContextResolver, DefinitionStores};
use actuate_config::RuntimeSettings;
use actuate_core::{
    substitute, ActionExecutionResult, Bindings, EnvironmentId, ExecuteActionRequest,
    ResolvedContext, Substitute, SubstitutionMode,
};
use actuate_registry::{DispatchOptions, Dispatcher, ExecutorRegistry, TimeoutPolicy};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Stateless between invocations; share one instance across concurrent callers.
#[derive(Clone)]
pub struct ActionExecutionSolution {
    normalizer: ParameterNormalizer,
    resolver: Arc<ContextResolver>,
    dispatcher: Dispatcher,
}

impl ActionExecutionSolution {
    pub fn new(
        normalizer: ParameterNormalizer,
        resolver: Arc<ContextResolver>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self { normalizer, resolver, dispatcher }
    }

    /// Wire every component from runtime settings
    pub fn from_settings(
        settings: &RuntimeSettings,
        stores: DefinitionStores,
        registry: ExecutorRegistry,
    ) -> Self {
        let timeouts = TimeoutPolicy {
            default: settings.execution.default_timeout(),
            max: settings.execution.max_timeout(),
        };
        Self::new(
            ParameterNormalizer::new(settings.upload.clone()),
            Arc::new(ContextResolver::new(
                stores,
                &settings.cache,
                settings.default_environment.as_str(),
            )),
            Dispatcher::new(Arc::new(registry), timeouts),
        )
    }

    pub fn resolver(&self) -> &Arc<ContextResolver> {
        &self.resolver
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Execute from a streamed multipart upload.
    ///
    /// Resolution starts as soon as the descriptor part is decoded and runs
    /// while the remaining parts are read. A normalization failure is
    /// reported ahead of a resolution failure.
    pub async fn execute_from_upload(
        &self,
        parts: PartStream,
        branch_name: Option<&str>,
        environment_id: &EnvironmentId,
    ) -> RuntimeResult<ActionExecutionResult> {
        let (hint_tx, hint_rx) = oneshot::channel::<ResolutionHint>();
        let normalize = self.normalizer.normalize_upload(parts, Some(hint_tx));
        let resolve = async {
            // Sender dropped without a hint means normalization already failed.
            let hint = hint_rx.await.ok()?;
            Some(
                self.resolver
                    .resolve(&hint.action_id, branch_name, environment_id, hint.view_mode)
                    .await,
            )
        };
        let (normalized, resolved) = tokio::join!(normalize, resolve);

        let mut request = normalized?;
        if let Some(branch) = branch_name {
            request.branch_name = Some(branch.to_string());
        }
        let context = match resolved {
            Some(resolved) => resolved?,
            None => {
                self.resolver
                    .resolve(&request.action_id, request.branch(), environment_id, request.view_mode)
                    .await?
            }
        };
        self.run(request, &context).await
    }

    /// Execute a request built by a structured (non-upload) transport.
    pub async fn execute_structured(
        &self,
        request: ExecuteActionRequest,
        environment_id: &EnvironmentId,
    ) -> RuntimeResult<ActionExecutionResult> {
        reject_unnamed(&request.params)?;
        let context = self
            .resolver
            .resolve(&request.action_id, request.branch(), environment_id, request.view_mode)
            .await?;
        self.run(request, &context).await
    }

    /// Strict substitution of `replace_params` into any substitutable node
    pub fn variable_substitution<T: Substitute>(
        &self,
        configuration: &T,
        replace_params: &Bindings,
    ) -> RuntimeResult<T> {
        Ok(substitute(configuration, replace_params, SubstitutionMode::Strict)?.value)
    }

    async fn run(
        &self,
        request: ExecuteActionRequest,
        context: &ResolvedContext,
    ) -> RuntimeResult<ActionExecutionResult> {
        let bindings = request.merged_bindings();
        let substituted =
            substitute(&context.definition.configuration, &bindings, request.substitution_mode)
                .map_err(|err| {
                    tracing::warn!(
                        action_id = %context.action.id,
                        error = %err,
                        "Binding substitution failed; action not dispatched"
                    );
                    RuntimeError::from(err)
                })?;

        for warning in &substituted.warnings {
            tracing::warn!(action_id = %context.action.id, warning = %warning, "Lenient substitution");
        }

        let options = DispatchOptions {
            execution_id: None,
            timeout: request.timeout,
            attachments: request.attachments,
            warnings: substituted.warnings,
        };
        Ok(self.dispatcher.dispatch(context, substituted.value, options).await)
    }
}

//! The capability every plugin type registers

use crate::error::ExecutorResult;
use actuate_core::{
    ActionConfiguration, ActionId, AttachmentRef, EnvironmentId, PluginKind, ResolvedContext,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Static description of a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginMetadata {
    pub kind: PluginKind,
    pub display_name: String,
    pub description: String,
    pub version: String,
}

/// Everything an executor gets for one invocation
#[derive(Debug, Clone)]
pub struct ExecutorInput {
    pub execution_id: String,
    pub action_id: ActionId,
    pub action_name: String,
    pub environment_id: EnvironmentId,
    /// Datasource connection config for the selected environment
    pub datasource_config: JsonValue,
    /// Datasource credentials for the selected environment
    pub credentials: JsonValue,
    /// Action configuration with every binding substituted
    pub configuration: ActionConfiguration,
    pub attachments: Vec<AttachmentRef>,
}

impl ExecutorInput {
    pub fn from_context(
        execution_id: impl Into<String>,
        context: &ResolvedContext,
        configuration: ActionConfiguration,
        attachments: Vec<AttachmentRef>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            action_id: context.action.id.clone(),
            action_name: context.action.name.clone(),
            environment_id: context.environment_id.clone(),
            datasource_config: context.storage.config.clone(),
            credentials: context.storage.credentials.clone(),
            configuration,
            attachments,
        }
    }
}

/// What a backend answered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorOutput {
    /// Backend status, e.g. an HTTP status or a driver result code
    pub status_code: Option<String>,
    pub body: JsonValue,
    pub headers: IndexMap<String, JsonValue>,
}

impl ExecutorOutput {
    pub fn new(body: JsonValue) -> Self {
        Self { body, ..Default::default() }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status_code = Some(status.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.headers.insert(name.into(), value);
        self
    }
}

/// Executor capability for one plugin type
#[async_trait]
pub trait PluginExecutor: Send + Sync {
    /// The plugin type this executor handles
    fn plugin_kind(&self) -> PluginKind;

    /// Get metadata for this plugin (description, version, etc.)
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            kind: self.plugin_kind(),
            display_name: self.plugin_kind().to_string(),
            description: String::new(),
            version: "1.0".into(),
        }
    }

    /// Run the action. The future may be dropped at any await point when the
    /// deadline passes or the caller goes away.
    async fn execute(&self, input: ExecutorInput) -> ExecutorResult<ExecutorOutput>;
}

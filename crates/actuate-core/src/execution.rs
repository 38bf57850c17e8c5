//! Execution request and result envelope.

use crate::binding::SubstitutionMode;
use crate::error::ErrorKind;
use crate::params::{AttachmentRef, Bindings, CommandQueryParams};
use crate::types::{
    ActionDefinition, ActionId, ActionRecord, DatasourceRecord, DatasourceStorage, EnvironmentId,
    PluginKind, ViewMode,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Unified execution intent, consumed once by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ExecuteActionRequest {
    pub action_id: ActionId,
    /// Empty or `None` selects the application's default line.
    pub branch_name: Option<String>,
    pub params: CommandQueryParams,
    /// Bindings already supplied by the caller; query/header params are merged beneath them.
    pub bindings: Bindings,
    pub view_mode: ViewMode,
    pub substitution_mode: SubstitutionMode,
    /// Overrides the action's own timeout.
    pub timeout: Option<Duration>,
    pub attachments: Vec<AttachmentRef>,
}

impl ExecuteActionRequest {
    pub fn new(action_id: impl Into<ActionId>) -> Self {
        Self { action_id: action_id.into(), ..Default::default() }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch_name = Some(branch.into());
        self
    }

    pub fn with_params(mut self, params: CommandQueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    pub fn with_view_mode(mut self, view_mode: ViewMode) -> Self {
        self.view_mode = view_mode;
        self
    }

    pub fn lenient(mut self) -> Self {
        self.substitution_mode = SubstitutionMode::Lenient;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Branch name with empty strings treated as absent.
    pub fn branch(&self) -> Option<&str> {
        self.branch_name.as_deref().filter(|b| !b.trim().is_empty())
    }

    /// Full binding set: header params, then query params, then explicit bindings.
    pub fn merged_bindings(&self) -> Bindings {
        let mut merged = self.params.to_bindings();
        for (name, value) in &self.bindings {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

/// Concrete action version plus the environment-bound datasource it runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedContext {
    pub action: ActionRecord,
    /// Draft or published side selected by the view mode.
    pub definition: ActionDefinition,
    pub view_mode: ViewMode,
    pub datasource: DatasourceRecord,
    pub environment_id: EnvironmentId,
    pub storage: DatasourceStorage,
}

impl ResolvedContext {
    pub fn plugin(&self) -> &PluginKind {
        &self.datasource.plugin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    /// Backend-specific error code reported by the executor, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_error_code: Option<String>,
}

impl ErrorDetail {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), plugin_error_code: None }
    }

    pub fn with_plugin_code(mut self, code: impl Into<String>) -> Self {
        self.plugin_error_code = Some(code.into());
        self
    }
}

/// Outcome envelope returned to the caller. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionExecutionResult {
    pub execution_id: String,
    pub action_id: ActionId,
    pub success: bool,
    pub status_code: String,
    pub body: JsonValue,
    pub headers: IndexMap<String, JsonValue>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ActionExecutionResult {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn http_status(&self) -> u16 {
        match &self.error {
            None => 200,
            Some(detail) => detail.kind.http_status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::OldParam;
    use serde_json::json;

    #[test]
    fn explicit_bindings_override_query_and_header_params() {
        let request = ExecuteActionRequest::new("a1")
            .with_params(CommandQueryParams::new(
                vec![OldParam::new("id", "1"), OldParam::new("page", "2")],
                vec![OldParam::new("id", "9"), OldParam::new("tenant", "acme")],
            ))
            .with_binding("page", json!(5));

        let merged = request.merged_bindings();
        assert_eq!(merged["id"], "1");
        assert_eq!(merged["tenant"], "acme");
        assert_eq!(merged["page"], json!(5));
    }

    #[test]
    fn blank_branch_means_default_line() {
        assert_eq!(ExecuteActionRequest::new("a").with_branch("  ").branch(), None);
        assert_eq!(ExecuteActionRequest::new("a").with_branch("feature").branch(), Some("feature"));
        assert_eq!(ExecuteActionRequest::new("a").branch(), None);
    }

    #[test]
    fn failed_result_serializes_error_kind() {
        let result = ActionExecutionResult {
            execution_id: "e1".into(),
            action_id: ActionId::new("a1"),
            success: false,
            status_code: ErrorKind::ExecutionTimeout.as_str().into(),
            body: JsonValue::Null,
            headers: IndexMap::new(),
            duration_ms: 3000,
            started_at: Utc::now(),
            warnings: vec![],
            error: Some(ErrorDetail::new(ErrorKind::ExecutionTimeout, "timed out")),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["error"]["kind"], "EXECUTION_TIMEOUT");
        assert!(value.get("warnings").is_none());
        assert_eq!(result.http_status(), 504);
    }
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("serde: {0}")]
    Serde(String),
    #[error("io: {0}")]
    Io(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Caller-visible failure classes carried by [`crate::execution::ErrorDetail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MalformedParameter,
    BranchNotFound,
    EnvironmentNotConfigured,
    ActionNotFound,
    DatasourceNotFound,
    UnresolvedBinding,
    ExecutionTimeout,
    PluginNotRegistered,
    Executor,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedParameter => "MALFORMED_PARAMETER",
            ErrorKind::BranchNotFound => "BRANCH_NOT_FOUND",
            ErrorKind::EnvironmentNotConfigured => "ENVIRONMENT_NOT_CONFIGURED",
            ErrorKind::ActionNotFound => "ACTION_NOT_FOUND",
            ErrorKind::DatasourceNotFound => "DATASOURCE_NOT_FOUND",
            ErrorKind::UnresolvedBinding => "UNRESOLVED_BINDING",
            ErrorKind::ExecutionTimeout => "EXECUTION_TIMEOUT",
            ErrorKind::PluginNotRegistered => "PLUGIN_NOT_REGISTERED",
            ErrorKind::Executor => "EXECUTOR",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// HTTP status a transport layer should answer with for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::MalformedParameter | ErrorKind::UnresolvedBinding => 400,
            ErrorKind::BranchNotFound
            | ErrorKind::ActionNotFound
            | ErrorKind::DatasourceNotFound => 404,
            ErrorKind::EnvironmentNotConfigured => 422,
            ErrorKind::ExecutionTimeout => 504,
            ErrorKind::PluginNotRegistered | ErrorKind::Executor => 502,
            ErrorKind::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

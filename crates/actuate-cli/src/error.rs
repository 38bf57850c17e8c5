//! Error types for the CLI

use thiserror::Error;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] actuate_config::ConfigError),

    #[error("{0}")]
    Runtime(#[from] actuate_runtime::RuntimeError),

    #[error("Store error: {0}")]
    Store(#[from] actuate_core::CoreError),

    #[error("Binding error: {0}")]
    Binding(#[from] actuate_core::BindingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("General error: {0}")]
    General(String),
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::General(err.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

//! Error types reported by plugin executors

use thiserror::Error;

/// Failure raised inside an executor. The dispatcher turns every variant into
/// a failed result envelope; none of them escape as a fault.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Execution failed: {message}")]
    Failed { message: String, code: Option<String> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into(), code: None }
    }

    pub fn failed_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Failed { message: message.into(), code: Some(code.into()) }
    }

    /// Backend error code to surface in the result, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ExecutorError::Failed { code, .. } => code.as_deref(),
            ExecutorError::InvalidConfig(_) => Some("INVALID_CONFIG"),
            ExecutorError::Connection(_) => Some("CONNECTION"),
            ExecutorError::Authentication(_) => Some("AUTHENTICATION"),
            ExecutorError::Serialization(_) | ExecutorError::Io(_) => None,
        }
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

use actuate_core::{
    ApplicationId, BindingError, CoreError, DatasourceId, EnvironmentId, ErrorDetail, ErrorKind,
};
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failures that stop an invocation before any executor runs.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Malformed parameter: {0}")]
    MalformedParameter(String),

    #[error("Branch '{branch}' not found for application '{application}'")]
    BranchNotFound { application: ApplicationId, branch: String },

    #[error("Datasource '{datasource}' is not configured for environment '{environment}'")]
    EnvironmentNotConfigured { datasource: DatasourceId, environment: EnvironmentId },

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Datasource not found: {0}")]
    DatasourceNotFound(DatasourceId),

    #[error(transparent)]
    UnresolvedBinding(#[from] BindingError),

    #[error("Store error: {0}")]
    Store(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedParameter(msg.into())
    }

    pub fn action_not_found(msg: impl Into<String>) -> Self {
        Self::ActionNotFound(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::MalformedParameter(_) => ErrorKind::MalformedParameter,
            RuntimeError::BranchNotFound { .. } => ErrorKind::BranchNotFound,
            RuntimeError::EnvironmentNotConfigured { .. } => ErrorKind::EnvironmentNotConfigured,
            RuntimeError::ActionNotFound(_) => ErrorKind::ActionNotFound,
            RuntimeError::DatasourceNotFound(_) => ErrorKind::DatasourceNotFound,
            RuntimeError::UnresolvedBinding(_) => ErrorKind::UnresolvedBinding,
            RuntimeError::Store(_) | RuntimeError::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Error detail for transports that render pre-dispatch failures as an envelope.
    pub fn to_detail(&self) -> ErrorDetail {
        ErrorDetail::new(self.kind(), self.to_string())
    }
}

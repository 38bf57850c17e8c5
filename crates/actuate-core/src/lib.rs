pub mod binding;
pub mod error;
pub mod execution;
pub mod params;
pub mod sanitization;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use binding::{substitute, BindingError, Substitute, Substituted, SubstitutionMode};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use execution::{ActionExecutionResult, ErrorDetail, ExecuteActionRequest, ResolvedContext};
pub use params::{AttachmentRef, Bindings, CommandQueryParams, OldParam};
pub use sanitization::{is_sensitive_field, redact_all, sanitize_json_value};
pub use store::{ActionRepository, ApplicationStore, DatasourceStore};
pub use types::{
    ActionConfiguration, ActionDefinition, ActionId, ActionRecord, ApplicationId,
    ApplicationRecord, DatasourceId, DatasourceRecord, DatasourceStorage, EnvironmentId,
    PluginKind, ViewMode,
};

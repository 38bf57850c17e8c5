pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod registry;

// Re-export commonly used types
pub use dispatcher::{DispatchOptions, Dispatcher, TimeoutPolicy};
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{ExecutorInput, ExecutorOutput, PluginExecutor, PluginMetadata};
pub use registry::{ExecutorRegistry, PluginRegistrar};

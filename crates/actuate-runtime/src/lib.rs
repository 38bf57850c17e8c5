//! Action execution orchestration: parameter normalization, context
//! resolution, binding substitution and dispatch.

pub mod error;
pub mod normalizer;
pub mod parts;
pub mod resolver;
pub mod solution;

pub use error::{RuntimeError, RuntimeResult};
pub use normalizer::{
    ExecuteActionDto, NormalizedParams, ParameterNormalizer, ResolutionHint,
    EXECUTE_ACTION_DTO_PART, PARAMETER_MAP_PART,
};
pub use parts::{
    boundary_from_content_type, multipart_stream, part_stream, PartBody, PartStream, UploadedPart,
};
pub use resolver::{CacheStats, ContextResolver, DefinitionStores};
pub use solution::ActionExecutionSolution;

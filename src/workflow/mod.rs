//! Workflow document model, options, rendering and outputs.

mod options;
mod output;
mod render;
mod schema;

pub use options::{
    EnvironmentManagement, GenerationOptions, GenerationOptionsBuilder, OptimizationLevel,
    SecurityLevel, WorkflowType, DEFAULT_BRANCH, DEFAULT_RUNNER,
};
pub use output::{digest, GenerationNotes, WorkflowMetadata, WorkflowOutput, GENERATOR_VERSION};
pub use render::{to_yaml, Renderer};
pub use schema::{
    expression_string, Concurrency, DispatchInput, EventFilter, Job, JobEnvironment, Jobs, MatrixAxis,
    PermissionLevel, Permissions, RepositoryDispatch, Schedule, Step, Strategy, Triggers,
    Workflow, WorkflowDispatch, WorkflowRunTrigger,
};

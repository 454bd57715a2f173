//! Workflow validation and best-practices scoring.
//!
//! Validation runs in two phases: parsing, where failure is a
//! [`WorkflowSyntax`](crate::error::GenerationError::WorkflowSyntax) error, and
//! structural checks over the parsed document, which are collected into a
//! [`ValidationResult`].

mod scorer;
mod validator;

pub use scorer::{score_best_practices, score_document, BestPracticesScore};
pub use validator::{
    is_branch_ref, is_pinned, parse_workflow, ValidationResult, WorkflowValidator,
};

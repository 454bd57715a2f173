//! Detection input and conflict resolution.
//!
//! The detection result is produced by an external analyzer. This module
//! parses and validates it, then reduces competing candidates to a single
//! consistent view used by every generator.

mod resolver;
mod types;

pub use resolver::{ConflictResolver, ResolvedDetection, DEFAULT_MIN_RELEVANCE};
pub use types::{
    BuildToolDetection, Candidate, DeploymentTargetDetection, DetectionResult, FrameworkCategory,
    FrameworkDetection, LanguageDetection, PackageManagerDetection, ProjectMetadata, TestType,
    TestingFrameworkDetection,
};

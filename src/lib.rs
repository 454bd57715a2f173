#![allow(clippy::needless_collect)]
#![allow(clippy::format_push_string)]
#![allow(clippy::unused_self)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::should_implement_trait)]

//! # cicdgen
//!
//! Generate validated GitHub Actions workflows from project detection results.
//!
//! cicdgen takes the output of a project analyzer (detected frameworks,
//! languages, package managers, test frameworks and deployment targets),
//! reconciles conflicting signals and renders deterministic workflow YAML.
//!
//! ## Features
//!
//! - **Base workflows**: CI, CD, security, performance, testing strategy, monitoring
//! - **Multi-environment**: per-environment deploys with approvals, promotion and rollback
//! - **Patterns**: monorepo selective builds, microservices, canary, blue-green, feature flags
//! - **Agent hooks**: dependency updates and performance regression workflows
//! - **Validation**: structural checks and a best-practices score for any workflow
//!
//! ## Quick Start
//!
//! ```no_run
//! use cicdgen::{DetectionResult, GenerationOptions, YamlGenerator};
//!
//! let detection = DetectionResult::from_json(r#"{"languages": [{"name": "rust", "confidence": 0.9, "primary": true}]}"#)?;
//! let output = YamlGenerator::new().generate_workflow(&detection, &GenerationOptions::default())?;
//! println!("{}", output.content);
//! # Ok::<(), cicdgen::GenerationError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod config;
pub mod detection;
pub mod engine;
pub mod environments;
pub mod error;
pub mod generators;
pub mod hooks;
pub mod patterns;
pub mod templates;
pub mod validation;
pub mod workflow;

// Re-export commonly used types
pub use config::Config;
pub use detection::{ConflictResolver, DetectionResult, ResolvedDetection};
pub use engine::{FailurePolicy, SuiteFailure, SuiteResult, YamlGenerator};
pub use environments::{EnvironmentConfig, MultiEnvResult};
pub use error::{GenerationError, GenerationResult, GenerationWarning};
pub use patterns::PatternConfig;
pub use validation::{BestPracticesScore, ValidationResult};
pub use workflow::{GenerationOptions, WorkflowOutput, WorkflowType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "cicdgen";

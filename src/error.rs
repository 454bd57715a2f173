//! Error and warning types for workflow generation.
//!
//! Fatal problems are [`GenerationError`]s and abort the call that raised
//! them. Recoverable problems are [`GenerationWarning`]s; they never abort
//! generation and end up in `metadata.warnings` of the produced workflows.

use std::fmt;

use thiserror::Error;

/// Result type for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Errors that abort a generation or validation call.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Detection input is null, malformed, or violates its invariants.
    #[error("Invalid detection input: {0}")]
    InvalidInput(String),

    /// Advanced pattern type is not one of the known variants.
    #[error(
        "Unsupported pattern type '{0}' (expected one of: monorepo, microservices, canary, blue-green, feature-flags)"
    )]
    UnsupportedPattern(String),

    /// A package or service dependency graph contains a cycle.
    #[error("Cyclic dependency detected: {}", .nodes.join(" -> "))]
    CyclicDependency { nodes: Vec<String> },

    /// Workflow text could not be parsed as YAML.
    #[error("Workflow syntax error{}: {message}", location_suffix(.line, .column))]
    WorkflowSyntax { message: String, line: Option<usize>, column: Option<usize> },

    /// A generator failed at a specific stage.
    #[error("Generator '{component}' failed during {stage}: {message}")]
    GeneratorFailed { component: String, stage: String, message: String },

    /// A generator exceeded the caller-supplied timeout.
    #[error("Generator '{component}' timed out after {elapsed_ms} ms")]
    Timeout { component: String, elapsed_ms: u128 },

    /// YAML serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    /// Build a [`GenerationError::GeneratorFailed`] for a component/stage pair.
    pub fn generator_failed(
        component: impl Into<String>,
        stage: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::GeneratorFailed {
            component: component.into(),
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid-input",
            Self::UnsupportedPattern(_) => "unsupported-pattern",
            Self::CyclicDependency { .. } => "cyclic-dependency",
            Self::WorkflowSyntax { .. } => "workflow-syntax",
            Self::GeneratorFailed { .. } => "generator-failed",
            Self::Timeout { .. } => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" at line {line}, column {column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

/// Recoverable issues collected during generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationWarning {
    /// No specific template matched; a generic one was used instead.
    TemplateFallback { component: String, reason: String },

    /// The selected candidate of a category has a low confidence score.
    LowConfidence { category: String, name: String, confidence: f64 },

    /// Several relevant candidates competed for the same category.
    Conflict { category: String, selected: String, rejected: Vec<String> },

    /// Detection data needed by a generator is missing.
    MissingData { field: String, detail: String },

    /// Canary traffic percentages decrease between two stages.
    NonMonotonicCanary { stage: usize, previous: u8, current: u8 },

    /// An environment names a promotion source that does not exist.
    UnknownPromotionSource { environment: String, source: String },
}

impl GenerationWarning {
    /// Short machine-friendly name of the warning kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TemplateFallback { .. } => "template-fallback",
            Self::LowConfidence { .. } => "low-confidence",
            Self::Conflict { .. } => "conflict",
            Self::MissingData { .. } => "missing-data",
            Self::NonMonotonicCanary { .. } => "non-monotonic-canary",
            Self::UnknownPromotionSource { .. } => "unknown-promotion-source",
        }
    }
}

impl fmt::Display for GenerationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemplateFallback { component, reason } => {
                write!(f, "{component}: falling back to generic template ({reason})")
            }
            Self::LowConfidence { category, name, confidence } => {
                write!(f, "Low confidence {category} '{name}' ({confidence:.2})")
            }
            Self::Conflict { category, selected, rejected } => {
                write!(
                    f,
                    "Multiple {category} candidates detected: selected '{selected}', rejected {}",
                    rejected.iter().map(|r| format!("'{r}'")).collect::<Vec<_>>().join(", ")
                )
            }
            Self::MissingData { field, detail } => write!(f, "Missing {field}: {detail}"),
            Self::NonMonotonicCanary { stage, previous, current } => write!(
                f,
                "Canary stage {stage} lowers traffic from {previous}% to {current}%"
            ),
            Self::UnknownPromotionSource { environment, source } => write!(
                f,
                "Environment '{environment}' promotes from unknown environment '{source}'"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_lists_nodes() {
        let err = GenerationError::CyclicDependency {
            nodes: vec!["api".to_string(), "web".to_string(), "api".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic dependency detected: api -> web -> api");
        assert_eq!(err.kind(), "cyclic-dependency");
    }

    #[test]
    fn test_syntax_error_location() {
        let err = GenerationError::WorkflowSyntax {
            message: "did not find expected key".to_string(),
            line: Some(3),
            column: Some(5),
        };
        assert!(err.to_string().contains("at line 3, column 5"));

        let err = GenerationError::WorkflowSyntax {
            message: "bad".to_string(),
            line: None,
            column: None,
        };
        assert_eq!(err.to_string(), "Workflow syntax error: bad");
    }

    #[test]
    fn test_conflict_warning_names_rejected() {
        let warning = GenerationWarning::Conflict {
            category: "frontend framework".to_string(),
            selected: "react".to_string(),
            rejected: vec!["vue".to_string(), "svelte".to_string()],
        };
        let text = warning.to_string();
        assert!(text.contains("'react'"));
        assert!(text.contains("'vue', 'svelte'"));
        assert_eq!(warning.kind(), "conflict");
    }
}
